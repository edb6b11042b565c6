use eyre::Context as _;
use rand::Rng as _;
use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

fn is_symlink(p: &Path) -> eyre::Result<bool> {
    let md = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;
    Ok(md.file_type().is_symlink())
}

/// Create `dir` if missing and clamp it to owner-only permissions on Unix.
pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    if dir.exists() {
        if is_symlink(dir)? {
            eyre::bail!("refusing to use symlinked directory: {}", dir.display());
        }
        if !dir.is_dir() {
            eyre::bail!("expected directory at {}", dir.display());
        }
    } else {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        let md = fs::metadata(dir).with_context(|| format!("stat {}", dir.display()))?;
        if (md.permissions().mode() & 0o077) != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
                .with_context(|| format!("chmod {MODE_DIR_PRIVATE:o} {}", dir.display()))?;
        }
    }

    Ok(())
}

fn tmp_path_for(parent: &Path, final_name: &Path) -> PathBuf {
    let base = final_name
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let mut rand_bytes = [0_u8; 8];
    rand::rng().fill_bytes(&mut rand_bytes);
    parent.join(format!(".{base}.tmp.{}", hex::encode(rand_bytes)))
}

/// Write via temp file + rename so readers never observe a half-written config.
pub fn write_private_atomic(path: &Path, contents: &str) -> eyre::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| eyre::eyre!("missing parent for {}", path.display()))?;
    ensure_private_dir(parent)?;

    if path.exists() && is_symlink(path)? {
        eyre::bail!("refusing to write to symlink: {}", path.display());
    }

    let tmp = tmp_path_for(parent, path);
    let mut oo = OpenOptions::new();
    oo.create_new(true).write(true);
    #[cfg(unix)]
    {
        oo.mode(MODE_FILE_PRIVATE);
    }
    let mut f = oo
        .open(&tmp)
        .with_context(|| format!("open temp {}", tmp.display()))?;
    f.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("fsync {}", tmp.display()))?;
    drop(f);

    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("remove existing {}", path.display()))?;
        }
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parent_and_replaces_content() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("nested").join("config.toml");
        write_private_atomic(&p, "a = 1\n")?;
        write_private_atomic(&p, "a = 2\n")?;
        assert_eq!(fs::read_to_string(&p)?, "a = 2\n");
        #[cfg(unix)]
        {
            let mode = fs::metadata(&p)?.permissions().mode() & 0o777;
            assert_eq!(mode, MODE_FILE_PRIVATE, "config must be owner-only");
        }
        Ok(())
    }
}
