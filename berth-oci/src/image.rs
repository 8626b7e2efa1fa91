use bollard::query_parameters::CreateImageOptions;
use tokio_stream::StreamExt;

use super::{Client, Credentials, Error, Result, WithContext};

#[derive(Debug, Clone)]
pub struct Image<'a>(&'a Client);

impl<'a> Image<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self(client)
    }
}

impl Image<'_> {
    /// Pulls an image from a registry.
    ///
    /// The pull is driven to completion by draining the engine's progress
    /// stream; the first failed chunk aborts the pull.
    pub async fn pull(&self, image: &str, creds: Option<Credentials>) -> Result<()> {
        let opts = Some(CreateImageOptions {
            from_image: Some(image.to_owned()),
            ..Default::default()
        });

        let mut stream = self.0.inner().create_image(opts, None, creds);
        while let Some(res) = stream.next().await {
            res.map_err(Error::from)
                .with_context(|| format!("failed to pull image {image}"))?;
        }

        Ok(())
    }
}
