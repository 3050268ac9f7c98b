//! Integration tests for the full identity pipeline.
//!
//! Tests: Enrollment → Credential check → Session → Authorization
//!
//! Each scenario runs against both the in-memory store and the file store so
//! the engine behaves the same regardless of backend.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use keyward_auth::store::{EntityStore, InMemoryStore, RoleStore};
    use keyward_auth::{
        AuthError, Authorization, IdentityEngine, PublicError, RoleBody, RoleId, RoleMap, Stores,
    };
    use keyward_core::{EngineConfig, ManualClock, Nick};

    use crate::file_store::FileStore;

    const HOST: &str = "127.0.0.1";

    fn test_config() -> EngineConfig {
        EngineConfig {
            server_id: "integration".to_string(),
            max_sign_in_attempts: 3,
            password_hash_cost: 4,
            ..EngineConfig::default()
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        engine: IdentityEngine,
        entities: Arc<dyn EntityStore>,
        roles: Arc<dyn RoleStore>,
        // Keeps the file store directory alive for the test's duration.
        _dir: Option<tempfile::TempDir>,
    }

    fn in_memory() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        build(Stores::shared(store.clone()), store.clone(), store, None)
    }

    fn on_disk() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        build(Stores::shared(store.clone()), store.clone(), store, Some(dir))
    }

    fn build(
        stores: Stores,
        entities: Arc<dyn EntityStore>,
        roles: Arc<dyn RoleStore>,
        dir: Option<tempfile::TempDir>,
    ) -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let engine = IdentityEngine::with_clock(test_config(), stores, clock.clone()).unwrap();
        Harness {
            clock,
            engine,
            entities,
            roles,
            _dir: dir,
        }
    }

    fn both() -> [Harness; 2] {
        [in_memory(), on_disk()]
    }

    #[test]
    fn enroll_sign_in_authorize() {
        for h in both() {
            let token = h.engine.new_enrollment_token().unwrap();
            let created = h.engine.new_entity(&token.token, &token.pin).unwrap();
            assert_eq!(created.entity.roles, vec![RoleId::new("application")]);
            assert_eq!(created.entity.nick.as_str().len(), 8);

            let session = h
                .engine
                .check_identity(created.entity.nick.as_str(), &created.password, HOST)
                .unwrap();
            assert!(h.engine.is_session_token_valid(&session.token, HOST));
            assert!(h.engine.is_authorized(&session.token, "application", "use"));
            assert!(!h.engine.is_authorized(&session.token, "keyward", "use"));

            let stored = h.entities.read_entity(&created.entity.nick).unwrap().unwrap();
            assert!(stored.last_sign_in.is_some());
            assert_ne!(stored.password_hash, created.password);
        }
    }

    #[test]
    fn session_token_lifecycle() {
        for h in both() {
            h.engine
                .create_entity("N1CK0001", "pw", "secret", &[RoleId::new("application")])
                .unwrap();
            let session = h.engine.check_identity("N1CK0001", "pw", HOST).unwrap();

            assert!(h.engine.is_session_token_valid(&session.token, HOST));
            assert!(!h.engine.is_session_token_valid(&session.token, "10.1.1.1"));

            h.clock.advance(Duration::seconds(719));
            assert!(h.engine.is_session_token_valid(&session.token, HOST));
            h.clock.advance(Duration::seconds(1));
            assert!(!h.engine.is_session_token_valid(&session.token, HOST));
            assert!(!h.engine.is_authorized(&session.token, "application", "use"));
        }
    }

    #[test]
    fn lockout_after_repeated_failures() {
        for h in both() {
            h.engine
                .create_entity("N1CK0001", "right", "secret", &[])
                .unwrap();

            for _ in 0..4 {
                let err = h.engine.check_identity("N1CK0001", "wrong", HOST).unwrap_err();
                assert_eq!(err.public(), PublicError::Unauthenticated);
            }
            let stored = h.entities.read_entity(&Nick::new("N1CK0001")).unwrap().unwrap();
            assert!(!stored.active);
            assert_eq!(stored.wrong_password_counter, 4);

            assert_eq!(
                h.engine.check_identity("N1CK0001", "right", HOST).unwrap_err(),
                AuthError::Inactive
            );

            // The secret unlocks the entity with a fresh password.
            let password = h.engine.recover_entity("N1CK0001", "secret").unwrap();
            let public = h.engine.public_entity("N1CK0001").unwrap();
            assert!(public.active);
            assert_eq!(public.wrong_password_counter, 0);
            assert!(h.engine.check_identity("N1CK0001", &password, HOST).is_ok());
        }
    }

    #[test]
    fn consumed_enrollment_token_cannot_be_reused() {
        for h in both() {
            let token = h.engine.new_enrollment_token().unwrap();
            h.engine.new_entity(&token.token, &token.pin).unwrap();
            assert_eq!(
                h.engine.new_entity(&token.token, &token.pin).unwrap_err(),
                AuthError::TokenNotFound
            );
            assert_eq!(
                h.engine.new_entity(&token.token, &token.pin).unwrap_err(),
                AuthError::TokenNotFound
            );
        }
    }

    #[test]
    fn expired_enrollment_token_is_rejected() {
        for h in both() {
            let token = h.engine.new_enrollment_token().unwrap();
            h.clock.advance(Duration::hours(168));
            let err = h.engine.new_entity(&token.token, &token.pin).unwrap_err();
            assert_eq!(err, AuthError::TokenExpired);
            assert_eq!(err.public(), PublicError::EnrollmentRejected);
        }
    }

    #[test]
    fn merged_roles_grant_union_of_actions() {
        for h in both() {
            let roles = RoleMap::from([
                (
                    RoleId::new("application"),
                    RoleBody::new(vec![Authorization::new("application", ["*"])]),
                ),
                (
                    RoleId::new("role.read"),
                    RoleBody::new(vec![Authorization::new("R", ["read"])]),
                ),
                (
                    RoleId::new("role.write"),
                    RoleBody::new(vec![Authorization::new("R", ["write"])]),
                ),
            ]);
            h.engine.save_roles(roles).unwrap();
            h.engine
                .create_entity(
                    "N1CK0001",
                    "pw",
                    "s",
                    &[RoleId::new("role.read"), RoleId::new("role.write")],
                )
                .unwrap();

            let session = h.engine.check_identity("N1CK0001", "pw", HOST).unwrap();
            assert!(h.engine.is_authorized(&session.token, "R", "read"));
            assert!(h.engine.is_authorized(&session.token, "R", "write"));
            assert!(!h.engine.is_authorized(&session.token, "R", "delete"));

            let resolved = h
                .engine
                .role_snapshot()
                .graph
                .resolve(&[RoleId::new("role.read"), RoleId::new("role.write")])
                .unwrap();
            assert_eq!(resolved.len(), 1);
            assert_eq!(resolved[0].actions.len(), 2);
        }
    }

    #[test]
    fn failed_role_reload_keeps_previous_roles() {
        for h in both() {
            h.engine
                .create_entity("N1CK0001", "pw", "s", &[RoleId::new("application")])
                .unwrap();

            // Someone writes a cyclic role set behind the engine's back.
            h.roles
                .save_roles(&RoleMap::from([
                    (
                        RoleId::new("application"),
                        RoleBody::default().containing([RoleId::new("loop")]),
                    ),
                    (
                        RoleId::new("loop"),
                        RoleBody::default().containing([RoleId::new("application")]),
                    ),
                ]))
                .unwrap();
            assert!(matches!(h.engine.reload_roles(), Err(AuthError::RoleCycle(_))));

            let session = h.engine.check_identity("N1CK0001", "pw", HOST).unwrap();
            assert!(h.engine.is_authorized(&session.token, "application", "use"));
        }
    }

    #[test]
    fn file_store_engine_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());

        let token = {
            let store = Arc::new(FileStore::open(dir.path()).unwrap());
            let engine =
                IdentityEngine::with_clock(test_config(), Stores::shared(store), clock.clone())
                    .unwrap();
            engine
                .save_roles(RoleMap::from([
                    (
                        RoleId::new("application"),
                        RoleBody::new(vec![Authorization::new("application", ["use"])]),
                    ),
                    (
                        RoleId::new("auditor"),
                        RoleBody::new(vec![Authorization::new("logs/*", ["read"])]),
                    ),
                ]))
                .unwrap();
            engine
                .save_default_roles(vec![RoleId::new("application"), RoleId::new("auditor")])
                .unwrap();
            engine.new_enrollment_token().unwrap()
        };

        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let engine =
            IdentityEngine::with_clock(test_config(), Stores::shared(store), clock).unwrap();
        let created = engine.new_entity(&token.token, &token.pin).unwrap();
        assert_eq!(
            created.entity.roles,
            vec![RoleId::new("application"), RoleId::new("auditor")]
        );

        let session = engine
            .check_identity(created.entity.nick.as_str(), &created.password, HOST)
            .unwrap();
        assert!(engine.is_authorized(&session.token, "logs/2026/10", "read"));
        assert!(!engine.is_authorized(&session.token, "application", "delete"));
    }
}
