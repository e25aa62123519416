//! Local persistence for session credentials
//!
//! [`EncryptedFilesystemStorage`] encrypts every file with an age x25519
//! identity and is what sessions are stored in.
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Environment variable holding a base64-encoded age identity
pub const ENCRYPTION_KEY_ENV: &str = "CLOUD_CONTROLLER_ENCRYPTION_KEY";
/// Environment variable overriding the storage root (defaults to `~/.cloud-controller`)
pub const HOME_ENV: &str = "CLOUD_CONTROLLER_HOME";

const KEY_FILE_NAME: &str = "encryption.key";

/// Boxed future returned by storage operations
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Key/value file storage addressed by relative paths
pub trait StorageBackend: Send + Sync {
    fn write<'a>(&'a self, path: &str, data: &[u8]) -> StorageFuture<'a, ()>;

    fn read<'a>(&'a self, path: &str) -> StorageFuture<'a, Vec<u8>>;

    fn exists(&self, path: &str) -> bool;

    fn remove<'a>(&'a self, path: &str) -> StorageFuture<'a, ()>;
}

/// Storage errors
#[derive(Debug)]
pub enum StorageError {
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
    /// Storage root could not be determined
    Path(String),
    /// Encryption or decryption failed
    Encryption(String),
    /// Encryption key could not be loaded, generated or stored
    Key(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Path(msg) => write!(f, "Path error: {}", msg),
            StorageError::Encryption(msg) => write!(f, "Encryption error: {}", msg),
            StorageError::Key(msg) => write!(f, "Encryption key error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Root directory for an instance's stored files
///
/// `$CLOUD_CONTROLLER_HOME/<instance_id>` when the variable is set,
/// `~/.cloud-controller/<instance_id>` otherwise.
pub fn instance_root(instance_id: &str) -> Result<PathBuf, StorageError> {
    let root = match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => dirs::home_dir()
            .ok_or_else(|| StorageError::Path("Cannot determine home directory".to_string()))?
            .join(".cloud-controller"),
    };
    Ok(root.join(instance_id))
}

/// Filesystem storage that encrypts data at rest with age
///
/// The identity comes from `CLOUD_CONTROLLER_ENCRYPTION_KEY` (base64 of the
/// `AGE-SECRET-KEY-...` string) when set. Otherwise it is read from, or
/// generated into, `<base_path>/encryption.key` with 0600 permissions.
pub struct EncryptedFilesystemStorage {
    base_path: PathBuf,
    identity: age::x25519::Identity,
}

impl EncryptedFilesystemStorage {
    /// Storage rooted at `base_path`, key file alongside the data
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        let key_path = base_path.join(KEY_FILE_NAME);
        Self::open_with_key_path(base_path, &key_path).await
    }

    /// Storage for one named instance under [`instance_root`]
    pub async fn for_instance(instance_id: &str) -> Result<Self, StorageError> {
        Self::open(instance_root(instance_id)?).await
    }

    async fn open_with_key_path(base_path: PathBuf, key_path: &Path) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_path).await?;
        let identity = load_or_generate_identity(key_path).await?;
        Ok(Self {
            base_path,
            identity,
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        use std::io::Write;

        let recipients: Vec<Box<dyn age::Recipient + Send>> =
            vec![Box::new(self.identity.to_public())];
        let encryptor = age::Encryptor::with_recipients(recipients)
            .ok_or_else(|| StorageError::Encryption("No recipients for encryption".to_string()))?;

        let mut ciphertext = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| StorageError::Encryption(format!("Failed to wrap output: {}", e)))?;
        writer
            .write_all(plaintext)
            .map_err(|e| StorageError::Encryption(format!("Failed to encrypt data: {}", e)))?;
        writer
            .finish()
            .map_err(|e| StorageError::Encryption(format!("Failed to finalize encryption: {}", e)))?;

        Ok(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StorageError> {
        use std::io::Read;

        let decryptor = match age::Decryptor::new(ciphertext)
            .map_err(|e| StorageError::Encryption(format!("Failed to read encrypted header: {}", e)))?
        {
            age::Decryptor::Recipients(d) => d,
            _ => {
                return Err(StorageError::Encryption(
                    "File is passphrase-encrypted, expected a recipient key".to_string(),
                ))
            }
        };

        let mut reader = decryptor
            .decrypt(std::iter::once(&self.identity as &dyn age::Identity))
            .map_err(|e| StorageError::Encryption(format!("Failed to decrypt data: {}", e)))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| StorageError::Encryption(format!("Failed to read decrypted data: {}", e)))?;
        Ok(plaintext)
    }
}

impl StorageBackend for EncryptedFilesystemStorage {
    fn write<'a>(&'a self, path: &str, data: &[u8]) -> StorageFuture<'a, ()> {
        let full_path = self.resolve(path);
        let data = data.to_vec();

        Box::pin(async move {
            let ciphertext = self.encrypt(&data)?;
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full_path, ciphertext).await?;
            tracing::debug!("Wrote encrypted {:?}", full_path);
            Ok(())
        })
    }

    fn read<'a>(&'a self, path: &str) -> StorageFuture<'a, Vec<u8>> {
        let full_path = self.resolve(path);

        Box::pin(async move {
            let ciphertext = tokio::fs::read(&full_path).await?;
            self.decrypt(&ciphertext)
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove<'a>(&'a self, path: &str) -> StorageFuture<'a, ()> {
        let full_path = self.resolve(path);

        Box::pin(async move {
            tokio::fs::remove_file(&full_path).await?;
            tracing::debug!("Removed encrypted {:?}", full_path);
            Ok(())
        })
    }
}

async fn load_or_generate_identity(key_path: &Path) -> Result<age::x25519::Identity, StorageError> {
    if let Ok(encoded) = std::env::var(ENCRYPTION_KEY_ENV) {
        tracing::debug!("Using encryption key from {}", ENCRYPTION_KEY_ENV);
        return parse_identity(&encoded);
    }

    if key_path.exists() {
        tracing::debug!("Loading encryption key from {:?}", key_path);
        let encoded = tokio::fs::read_to_string(key_path)
            .await
            .map_err(|e| StorageError::Key(format!("Failed to read key file: {}", e)))?;
        return parse_identity(&encoded);
    }

    tracing::info!("Generating new encryption key at {:?}", key_path);
    generate_identity(key_path).await
}

fn parse_identity(encoded: &str) -> Result<age::x25519::Identity, StorageError> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| StorageError::Key(format!("Invalid base64 key: {}", e)))?;
    let secret = String::from_utf8(decoded)
        .map_err(|e| StorageError::Key(format!("Invalid UTF-8 in key: {}", e)))?;

    secret
        .trim()
        .parse::<age::x25519::Identity>()
        .map_err(|e| StorageError::Key(format!("Invalid age identity: {}", e)))
}

/// Base64 form of an identity, as stored in key files and the env variable
pub fn encode_identity(identity: &age::x25519::Identity) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use secrecy::ExposeSecret;

    STANDARD.encode(identity.to_string().expose_secret().as_bytes())
}

async fn generate_identity(key_path: &Path) -> Result<age::x25519::Identity, StorageError> {
    let identity = age::x25519::Identity::generate();

    if let Some(parent) = key_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::Key(format!("Failed to create key directory: {}", e)))?;
    }

    tokio::fs::write(key_path, encode_identity(&identity))
        .await
        .map_err(|e| StorageError::Key(format!("Failed to write key file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| StorageError::Key(format!("Failed to set key file permissions: {}", e)))?;
    }

    Ok(identity)
}
