//! Idempotent provisioning of the demo admin user and device.

use crate::auth::hash_device_key;
use crate::db::Store;
use crate::errors::Result;
use crate::model::{NewDevice, NewUser, Role};
use tracing::{info, warn};

pub const DEMO_ADMIN_PASSWORD: &str = "admin123";
pub const DEMO_DEVICE_KEY: &str = "secret-api-key";

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub device_id: String,
    pub device_name: String,
    pub device_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOutcome {
    pub admin_created: bool,
    pub device_created: bool,
}

/// Creates the admin user and the device when absent. Existing rows are left
/// untouched, so a rerun never rotates credentials.
///
/// `hash_password` is injected so callers can pick the Argon2 cost.
pub async fn seed<F>(
    store: &dyn Store,
    config: &SeedConfig,
    hash_password: F,
) -> Result<SeedOutcome>
where
    F: Fn(&str) -> Result<String>,
{
    if config.admin_password == DEMO_ADMIN_PASSWORD {
        warn!("Admin account uses the demo default password; set ADMIN_PASSWORD");
    }
    if config.device_key == DEMO_DEVICE_KEY {
        warn!("Device {} uses the demo default key; set DEVICE_KEY", config.device_id);
    }

    let admin_created = match store.find_user(&config.admin_username).await? {
        Some(_) => false,
        None => {
            store
                .insert_user_if_absent(NewUser {
                    username: config.admin_username.clone(),
                    password_hash: hash_password(&config.admin_password)?,
                    role: Role::Admin,
                })
                .await?
        }
    };

    let device_created = store
        .insert_device_if_absent(NewDevice {
            id: config.device_id.clone(),
            name: config.device_name.clone(),
            key_hash: hash_device_key(&config.device_key),
        })
        .await?;

    info!(
        "Bootstrap: admin '{}' {}, device {} {}",
        config.admin_username,
        if admin_created { "created" } else { "already present" },
        config.device_id,
        if device_created { "created" } else { "already present" },
    );

    Ok(SeedOutcome {
        admin_created,
        device_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{verify_device_key, verify_password};
    use crate::memory::MemoryStore;

    fn config() -> SeedConfig {
        SeedConfig {
            admin_username: "admin".to_string(),
            admin_password: "s3cret".to_string(),
            device_id: "DEV-001".to_string(),
            device_name: "Ventilator-X1".to_string(),
            device_key: "device-key".to_string(),
        }
    }

    fn cheap_hash(password: &str) -> Result<String> {
        let params = argon2::Params::new(8, 1, 1, None).unwrap();
        let argon2 =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        crate::auth::hash_password_with(&argon2, password)
    }

    #[tokio::test]
    async fn test_seed_creates_admin_and_device() {
        let store = MemoryStore::new();
        let outcome = seed(&store, &config(), cheap_hash).await.unwrap();
        assert_eq!(
            outcome,
            SeedOutcome {
                admin_created: true,
                device_created: true
            }
        );

        let admin = store.find_user("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(verify_password("s3cret", &admin.password_hash).unwrap());

        let device = store.find_device("DEV-001").await.unwrap().unwrap();
        assert!(device.is_active());
        assert!(verify_device_key(&device, "device-key"));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        seed(&store, &config(), cheap_hash).await.unwrap();

        let mut rotated = config();
        rotated.admin_password = "other".to_string();
        rotated.device_key = "other".to_string();
        let outcome = seed(&store, &rotated, cheap_hash).await.unwrap();

        assert!(!outcome.admin_created);
        assert!(!outcome.device_created);
        let device = store.find_device("DEV-001").await.unwrap().unwrap();
        assert!(verify_device_key(&device, "device-key"));
    }
}
