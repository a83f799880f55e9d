use crate::storage::file::File;
use reqwest_middleware::ClientWithMiddleware;

/// A reference to a Google Cloud Storage bucket.
pub struct Bucket {
    client: ClientWithMiddleware,
    api_root: String,
    download_root: String,
    name: String,
}

impl Bucket {
    pub(crate) fn new(
        client: ClientWithMiddleware,
        api_root: String,
        download_root: String,
        name: String,
    ) -> Self {
        Self {
            client,
            api_root,
            download_root,
            name,
        }
    }

    /// Returns the name of the bucket.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a `File` instance that refers to the file at the specified path.
    ///
    /// # Arguments
    ///
    /// * `name` - The path to the file within the bucket (e.g., "articles/1700000000000_k3j2h1a.jpg").
    pub fn file(&self, name: &str) -> File {
        File::new(
            self.client.clone(),
            self.api_root.clone(),
            self.download_root.clone(),
            self.name.clone(),
            name.to_string(),
        )
    }
}
