use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::store::{validate_identity_id, EnrolledEncoding};

const STORE_VERSION: u32 = 1;
const STORE_ALGORITHM: &str = "AES-256-GCM";
const STORE_NONCE_LEN: usize = 12;
const STORE_EXTENSION: &str = "json";
pub const STORE_KEY_BYTES: usize = 32;

/// Durable backing for the encoding store.
///
/// Implementations persist whatever bounded, oldest-first sequence the store
/// hands them; capacity and eviction are never decided here.
pub trait EncodingPersistence: Send + Sync {
    fn load_all(&self) -> AppResult<Vec<(String, Vec<EnrolledEncoding>)>>;
    fn replace(&self, identity: &str, encodings: &[EnrolledEncoding]) -> AppResult<()>;
    fn remove(&self, identity: &str) -> AppResult<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPersistence;

impl EncodingPersistence for MemoryPersistence {
    fn load_all(&self) -> AppResult<Vec<(String, Vec<EnrolledEncoding>)>> {
        Ok(Vec::new())
    }

    fn replace(&self, _identity: &str, _encodings: &[EnrolledEncoding]) -> AppResult<()> {
        Ok(())
    }

    fn remove(&self, _identity: &str) -> AppResult<bool> {
        Ok(true)
    }
}

#[derive(Clone)]
pub struct StoreKey {
    bytes: Vec<u8>,
}

impl StoreKey {
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; STORE_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> AppResult<Self> {
        if bytes.len() != STORE_KEY_BYTES {
            return Err(AppError::Encryption(format!(
                "expected {STORE_KEY_BYTES} key bytes but found {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    pub fn from_base64(encoded: &str) -> AppResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| AppError::Encryption(format!("invalid store key encoding: {err}")))?;
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreKey(..)")
    }
}

/// One JSON document per identity under `dir`, optionally AES-256-GCM sealed.
#[derive(Debug, Clone)]
pub struct FilesystemPersistence {
    dir: PathBuf,
    key: Option<StoreKey>,
}

impl FilesystemPersistence {
    pub fn new(dir: impl Into<PathBuf>, key: Option<StoreKey>) -> Self {
        Self {
            dir: dir.into(),
            key,
        }
    }

    pub fn identity_path(&self, identity: &str) -> AppResult<PathBuf> {
        validate_identity_id(identity)?;
        Ok(self.dir.join(format!("{identity}.{STORE_EXTENSION}")))
    }

    fn key_bytes(&self) -> Option<&[u8]> {
        self.key.as_ref().map(StoreKey::as_bytes)
    }
}

impl EncodingPersistence for FilesystemPersistence {
    fn load_all(&self) -> AppResult<Vec<(String, Vec<EnrolledEncoding>)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AppError::StoreRead {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut loaded = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AppError::StoreRead {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STORE_EXTENSION) {
                continue;
            }
            let Some(identity) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_identity_id(identity).is_err() {
                debug!(path = %path.display(), "skipping file with invalid identity name");
                continue;
            }
            let encodings = read_identity_file(&path, self.key_bytes())?;
            loaded.push((identity.to_string(), encodings));
        }
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(loaded)
    }

    fn replace(&self, identity: &str, encodings: &[EnrolledEncoding]) -> AppResult<()> {
        let path = self.identity_path(identity)?;
        write_identity_file(&path, encodings, self.key_bytes())
    }

    fn remove(&self, identity: &str) -> AppResult<bool> {
        let path = self.identity_path(identity)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(AppError::StoreWrite { path, source }),
        }
    }
}

pub fn read_identity_file(path: &Path, key: Option<&[u8]>) -> AppResult<Vec<EnrolledEncoding>> {
    let data = fs::read(path).map_err(|source| AppError::StoreRead {
        path: path.to_path_buf(),
        source,
    })?;

    if let Ok(wrapper) = serde_json::from_slice::<EncryptedEncodingStore>(&data) {
        return decrypt_encrypted_store(path, wrapper, key);
    }

    serde_json::from_slice(&data).map_err(|err| AppError::InvalidStoreFile {
        path: path.to_path_buf(),
        message: format!("invalid encoding store contents: {err}"),
    })
}

pub fn write_identity_file(
    path: &Path,
    encodings: &[EnrolledEncoding],
    key: Option<&[u8]>,
) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::StoreWrite {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            let serialized = match key {
                Some(key_bytes) => serialize_encrypted_store(encodings, key_bytes)?,
                None => serde_json::to_vec_pretty(encodings)?,
            };
            writer
                .write_all(&serialized)
                .and_then(|_| writer.write_all(b"\n"))
                .and_then(|_| writer.flush())
                .map_err(|source| AppError::StoreWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        file.sync_all().map_err(|source| AppError::StoreWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let file = tmp.persist(path).map_err(|err| AppError::StoreWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file
            .metadata()
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?
            .permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }
    #[cfg(not(unix))]
    drop(file);

    Ok(())
}

fn serialize_encrypted_store(encodings: &[EnrolledEncoding], key: &[u8]) -> AppResult<Vec<u8>> {
    let plaintext = serde_json::to_vec(encodings)?;
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    let mut nonce = [0u8; STORE_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
        .map_err(|err| AppError::Encryption(format!("failed to encrypt encoding store: {err}")))?;
    let wrapper = EncryptedEncodingStore {
        version: STORE_VERSION,
        algorithm: STORE_ALGORITHM.to_string(),
        nonce: general_purpose::STANDARD.encode(nonce),
        ciphertext: general_purpose::STANDARD.encode(ciphertext),
    };
    serde_json::to_vec_pretty(&wrapper).map_err(AppError::from)
}

fn decrypt_encrypted_store(
    path: &Path,
    wrapper: EncryptedEncodingStore,
    key: Option<&[u8]>,
) -> AppResult<Vec<EnrolledEncoding>> {
    if wrapper.algorithm != STORE_ALGORITHM {
        return Err(AppError::Encryption(format!(
            "unsupported encoding store algorithm '{}'",
            wrapper.algorithm
        )));
    }
    if wrapper.version != STORE_VERSION {
        return Err(AppError::Encryption(format!(
            "unsupported encoding store version {}",
            wrapper.version
        )));
    }

    let key_bytes = key.ok_or_else(|| AppError::EncryptedStoreRequiresKey {
        path: path.to_path_buf(),
    })?;

    let nonce_bytes = general_purpose::STANDARD
        .decode(wrapper.nonce.trim())
        .map_err(|err| AppError::Encryption(format!("invalid nonce encoding: {err}")))?;
    if nonce_bytes.len() != STORE_NONCE_LEN {
        return Err(AppError::Encryption(format!(
            "expected nonce of {} bytes but found {}",
            STORE_NONCE_LEN,
            nonce_bytes.len()
        )));
    }

    let ciphertext = general_purpose::STANDARD
        .decode(wrapper.ciphertext.trim())
        .map_err(|err| AppError::Encryption(format!("invalid ciphertext encoding: {err}")))?;

    let cipher = Aes256Gcm::new_from_slice(key_bytes)
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|err| AppError::Encryption(format!("failed to decrypt encoding store: {err}")))?;

    serde_json::from_slice(&plaintext).map_err(|err| AppError::InvalidStoreFile {
        path: path.to_path_buf(),
        message: format!("invalid decrypted encoding store contents: {err}"),
    })
}

#[derive(Serialize, Deserialize)]
struct EncryptedEncodingStore {
    version: u32,
    algorithm: String,
    nonce: String,
    ciphertext: String,
}
