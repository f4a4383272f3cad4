//! MD5 digests of local files, streamed in fixed-size blocks so ROM zips
//! never have to fit in memory.

use std::io::Read;
use std::path::Path;

/// Length of a rendered MD5 digest: 32 lowercase hex characters.
pub const MD5_HEX_LEN: usize = 32;

const BLOCK_SIZE: usize = 64 * 1024;

/// Compute the MD5 digest of a file, rendered as lowercase hex.
///
/// Blocking; use [`md5_file`] from async contexts.
pub fn md5_file_sync(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut ctx = md5::Context::new();

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }

    Ok(format!("{:x}", ctx.compute()))
}

/// Async wrapper over [`md5_file_sync`] via `spawn_blocking`, keeping hash
/// work off the runtime's I/O threads.
pub async fn md5_file(path: &Path) -> anyhow::Result<String> {
    let path = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || md5_file_sync(&path)).await??;
    Ok(digest)
}

/// Whether `s` looks like a rendered MD5 digest.
pub fn is_md5_hex(s: &str) -> bool {
    s.len() == MD5_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
