use std::io;
use std::iter::repeat_with;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

const ALPHA_NUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn pseudorandom_string(len: usize) -> String {
    repeat_with(|| ALPHA_NUM[fastrand::usize(..ALPHA_NUM.len())] as char)
        .take(len)
        .collect()
}

/// Atomically creates a file with the given contents, overwriting
/// it if one exists.
///
/// This function will first write the buffer into a new file that
/// resides in the same directory as the desired file and then do
/// the complete sync/rename dance to ensure the buffer is safely
/// written to disk. If this function returns successfully, you can
/// be reasonably sure the write completed durably.
///
/// Read: [Ensuring data reaches to disk](https://lwn.net/Articles/457667/).
pub async fn safe_write_all<P: AsRef<Path>, B: AsRef<[u8]>>(path: P, buf: B) -> io::Result<()> {
    // create temp file
    let tmp_ext = "sync-".to_owned() + &pseudorandom_string(6);
    let tmp_path = path.as_ref().with_extension(tmp_ext);
    let mut tmp_file = fs::File::create(tmp_path.clone()).await?;

    // write given contents and sync to disk
    tmp_file.write_all(buf.as_ref()).await?;
    tmp_file.flush().await?;
    tmp_file.sync_all().await?;
    drop(tmp_file);

    // rename tmp file to destination
    fs::rename(&tmp_path, path.as_ref()).await
}
