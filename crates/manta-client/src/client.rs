//! Client facade
//!
//! Wires the signer, connection pool and helper together and exposes the
//! object verbs. With client-side encryption enabled, `put`/`get`/
//! `get_range` transparently encrypt and decrypt; the multipart managers
//! are handed out with the same wiring.

use std::sync::Arc;

use reqwest::Method;

use manta_core::object::{DIRECTORY_CONTENT_TYPE, LINK_CONTENT_TYPE};
use manta_core::{
    format_path, MantaConfig, MantaDirectoryEntry, MantaError, MantaHttpHeaders, MantaMetadata,
    MantaObject, MantaResult, ObjectDataSource,
};

use crate::encryption::EncryptionLayer;
use crate::entity::{entity_for, EmptyEntity, Entity};
use crate::helper::{ExpectedStatus, HttpHelper};
use crate::multipart::encrypted::EncryptedServerSideMultipartManager;
use crate::multipart::server::ServerSideMultipartManager;
use crate::seekable::MantaSeekableReader;
use crate::signer::HttpSigner;
use crate::transport::ConnectionFactory;

pub struct MantaClient {
    config: MantaConfig,
    helper: Arc<HttpHelper>,
    encryption: Option<Arc<EncryptionLayer>>,
}

impl MantaClient {
    /// Build a client from a validated configuration. Key loading and
    /// cipher selection failures are fatal here.
    pub fn new(config: MantaConfig) -> MantaResult<Self> {
        config.validate()?;

        let signer = match (&config.key_content, &config.key_path) {
            (Some(pem), _) => HttpSigner::from_key_bytes(
                pem,
                &config.key_id,
                config.key_passphrase.as_deref(),
                &config.user,
            )?,
            (None, Some(path)) => HttpSigner::from_key_file(path, &config.key_id, &config.user)?,
            (None, None) => unreachable!("validate() checked key material"),
        };

        let conn = Arc::new(ConnectionFactory::new(&config, Arc::new(signer))?);
        let helper = Arc::new(HttpHelper::new(conn, config.verify_uploads));
        let encryption = if config.encryption.enabled {
            Some(Arc::new(EncryptionLayer::new(&config.encryption)?))
        } else {
            None
        };

        Ok(Self {
            config,
            helper,
            encryption,
        })
    }

    pub fn config(&self) -> &MantaConfig {
        &self.config
    }

    /// The account's home directory, `/<user>`.
    pub fn home(&self) -> String {
        self.config.home_dir()
    }

    /// HEAD an object's headers and metadata.
    pub fn head(&self, path: &str) -> MantaResult<MantaObject> {
        self.helper.head(path)
    }

    /// GET an object. With encryption enabled the body is decrypted and
    /// verified per the configured authentication mode.
    pub fn get(&self, path: &str) -> MantaResult<(MantaObject, Vec<u8>)> {
        let (object, body) = self.helper.get(path)?;
        match &self.encryption {
            Some(layer) => {
                let plaintext = layer.decrypt_get(&object, body)?;
                Ok((object, plaintext))
            }
            None => Ok((object, body)),
        }
    }

    /// GET the plaintext byte range `[start, end)` of an object.
    ///
    /// For an encrypted object this fetches the corresponding ciphertext
    /// window and decrypts it in place, which requires a random-access
    /// cipher and optional authentication mode.
    pub fn get_range(&self, path: &str, start: u64, end: u64) -> MantaResult<Vec<u8>> {
        match &self.encryption {
            Some(layer) => {
                let object = self.helper.head(path)?;
                if !EncryptionLayer::is_encrypted(&object) {
                    let (_, body) = self.helper.get_range(path, start, end)?;
                    return layer.decrypt_get_range(&object, start, &body);
                }
                let (ct_start, ct_end) = layer.ciphertext_window(&object, start, end)?;
                let (_, window) = self.helper.get_range(path, ct_start, ct_end)?;
                layer.decrypt_get_range(&object, start, &window)
            }
            None => {
                let (_, body) = self.helper.get_range(path, start, end)?;
                Ok(body)
            }
        }
    }

    /// A lazy, seekable reader over the raw stored object. Encrypted
    /// objects surface ciphertext here; use [`MantaClient::get_range`]
    /// for decrypted windows.
    pub fn get_seekable(&self, path: &str) -> MantaSeekableReader {
        MantaSeekableReader::new(Arc::clone(self.helper.connection()), path)
    }

    /// PUT an object from one data source. With encryption enabled the
    /// body is encrypted in flight and the object records the
    /// `m-encrypt-*` metadata.
    pub fn put(
        &self,
        path: &str,
        source: ObjectDataSource,
        headers: Option<MantaHttpHeaders>,
        metadata: Option<MantaMetadata>,
    ) -> MantaResult<MantaObject> {
        let entity = entity_for(source)?;
        match &self.encryption {
            Some(layer) => {
                let mut metadata = metadata.unwrap_or_default();
                let entity = layer.wrap_for_put(entity, &mut metadata)?;
                self.helper
                    .put(path, headers, Some(Box::new(entity) as Box<dyn Entity>), Some(&metadata))
            }
            None => self
                .helper
                .put(path, headers, Some(entity), metadata.as_ref()),
        }
    }

    /// Create a directory.
    pub fn put_directory(&self, path: &str) -> MantaResult<()> {
        let mut headers = MantaHttpHeaders::new();
        headers.set_content_type(DIRECTORY_CONTENT_TYPE);
        self.helper.put(
            path,
            Some(headers),
            Some(Box::new(
                EmptyEntity::new().with_content_type(DIRECTORY_CONTENT_TYPE),
            )),
            None,
        )?;
        Ok(())
    }

    /// Create a snaplink at `link_path` pointing at `object_path`.
    pub fn put_snaplink(&self, link_path: &str, object_path: &str) -> MantaResult<()> {
        let mut headers = MantaHttpHeaders::new();
        headers.set_content_type(LINK_CONTENT_TYPE);
        headers.set("location", format_path(object_path));
        self.helper.put(
            link_path,
            Some(headers),
            Some(Box::new(
                EmptyEntity::new().with_content_type(LINK_CONTENT_TYPE),
            )),
            None,
        )?;
        Ok(())
    }

    /// DELETE an object or empty directory.
    pub fn delete(&self, path: &str) -> MantaResult<()> {
        self.helper.delete(path)
    }

    /// List a directory's entries, with absolute paths joined in.
    pub fn list_objects(&self, path: &str) -> MantaResult<Vec<MantaDirectoryEntry>> {
        let response = self.helper.exchange(
            Method::GET,
            path,
            &MantaHttpHeaders::new(),
            None,
            ExpectedStatus::Default,
        )?;
        if response.headers.content_type() != Some(DIRECTORY_CONTENT_TYPE) {
            return Err(MantaError::Other(anyhow::anyhow!(
                "{path} is not a directory"
            )));
        }

        let base = path.trim_end_matches('/');
        let mut entries = Vec::new();
        for line in response.body.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let mut entry: MantaDirectoryEntry = serde_json::from_slice(line)
                .map_err(|e| anyhow::anyhow!("directory listing line was not JSON: {e}"))?;
            entry.path = format!("{}/{}", base, entry.name);
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The server-side multipart upload manager.
    pub fn multipart(&self) -> ServerSideMultipartManager {
        ServerSideMultipartManager::new(Arc::clone(&self.helper), self.config.home_dir())
    }

    /// The encrypting multipart upload manager. Requires encryption to be
    /// configured.
    pub fn encrypted_multipart(&self) -> MantaResult<EncryptedServerSideMultipartManager> {
        if self.encryption.is_none() {
            return Err(MantaError::Config(
                "client-side encryption is not enabled".into(),
            ));
        }
        EncryptedServerSideMultipartManager::new(
            Arc::new(self.multipart()),
            &self.config.encryption,
        )
    }

    /// Tear down this handle. Outstanding readers and managers keep the
    /// pool alive until they are dropped.
    pub fn close(self) {}
}
