// Streaming archive download with byte-level progress.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

/// Download `url` to `dest`, reporting `(bytes_so_far, total)` after each
/// chunk. `total` is `None` when the server sends no content length.
///
/// Cancellation aborts between chunks; a partially written file is left on
/// disk for the caller's workspace cleanup to collect.
pub async fn download_to_file(
    http: &reqwest::Client,
    url: &Url,
    dest: &Path,
    cancel: &CancellationToken,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<(), ApiError> {
    debug!("GET {url} -> {}", dest.display());

    let resp = tokio::select! {
        () = cancel.cancelled() => return Err(ApiError::Cancelled),
        resp = http.get(url.clone()).send() => resp?,
    };
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            endpoint: url.to_string(),
        });
    }

    let total = resp.content_length();
    let mut stream = resp.bytes_stream();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut received: u64 = 0;

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(ApiError::Cancelled),
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(chunk) => {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                received += chunk.len() as u64;
                progress(received, total);
            }
            None => break,
        }
    }

    file.flush().await?;
    Ok(())
}
