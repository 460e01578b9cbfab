//! Whole-file helpers layered on top of the AFC.

use super::traits::{FileSystem, Result, VirtualFile};
use std::path::Path;

/// Chunk size for streamed reads and copies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Drain a handle from its current position to end of file.
pub async fn read_to_end(file: &mut dyn VirtualFile) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Write all of `data`, retrying short writes.
pub async fn write_all(file: &mut dyn VirtualFile, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let n = file.write(data).await?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
        }
        data = &data[n..];
    }
    Ok(())
}

pub async fn read_file<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Vec<u8>> {
    let mut file = fs.open(path).await?;
    let data = read_to_end(file.as_mut()).await?;
    file.close().await?;
    Ok(data)
}

/// Create or truncate `path` and fill it with `data`.
pub async fn write_file<F: FileSystem + ?Sized>(fs: &F, path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs.create(path).await?;
    write_all(file.as_mut(), data).await?;
    file.close().await
}

/// Stream one handle into another. Returns the number of bytes copied.
pub async fn copy(reader: &mut dyn VirtualFile, writer: &mut dyn VirtualFile) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        write_all(writer, &buf[..n]).await?;
        total += n as u64;
    }
}

/// True when `stat` succeeds. Errors other than `NotFound` propagate.
pub async fn exists<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<bool> {
    match fs.stat(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
