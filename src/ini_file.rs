use ini::{EscapePolicy, Ini, ParseError, ParseOption, WriteOption};
use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Parse INI text keeping values verbatim.
///
/// Backslashes and quotes belong to the value (Windows paths, secrets), so
/// neither escape nor quote handling is applied.
pub fn parse(content: &str) -> Result<Ini, ParseError> {
    Ini::load_from_str_opt(
        content,
        ParseOption {
            enabled_escape: false,
            enabled_quote: false,
            ..ParseOption::default()
        },
    )
}

/// Serialize without escaping, the inverse of [`parse`]
pub fn render(ini: &Ini) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ini.write_to_opt(
        &mut buffer,
        WriteOption {
            escape_policy: EscapePolicy::Nothing,
            ..WriteOption::default()
        },
    )?;
    Ok(buffer)
}

/// Replace `path` atomically with an owner-only (0600) file.
///
/// Writes a sibling temp file, syncs it, then renames it over the target.
/// The parent directory is created when missing.
pub async fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ini".to_string());
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let result = async {
        let mut file = options.open(&tmp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        // mode() only applies on creation; a leftover temp file keeps its old bits
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RAW: &str = "[static]\naws_secret_access_key=ab\\cd\"q\"\ncredential_process=C:\\Tools\\get.exe\nquoted='single' tail\n";

    #[test]
    fn test_values_are_kept_verbatim() {
        let ini = parse(RAW).unwrap();
        let section = ini.section(Some("static")).unwrap();
        assert_eq!(section.get("aws_secret_access_key"), Some("ab\\cd\"q\""));
        assert_eq!(section.get("credential_process"), Some("C:\\Tools\\get.exe"));
        assert_eq!(section.get("quoted"), Some("'single' tail"));
    }

    #[test]
    fn test_unknown_escape_sequence_parses() {
        let ini = parse("[a]\nkey=C:\\xyz\n").unwrap();
        assert_eq!(ini.get_from(Some("a"), "key"), Some("C:\\xyz"));
    }

    #[test]
    fn test_render_inverts_parse() {
        let rendered = render(&parse(RAW).unwrap()).unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("credential_process=C:\\Tools\\get.exe"));
        assert!(text.contains("aws_secret_access_key=ab\\cd\"q\""));

        let reparsed = parse(&text).unwrap();
        assert_eq!(
            reparsed.get_from(Some("static"), "quoted"),
            Some("'single' tail")
        );
    }

    #[tokio::test]
    async fn test_write_private_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file");

        write_private(&path, b"first").await.unwrap();
        write_private(&path, b"second").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_private_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"new").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
