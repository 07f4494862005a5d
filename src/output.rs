use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

/// Writes pretty JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&str>, value: &T, force: bool) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("serialize output json")?;
    json.push('\n');
    match path {
        Some(path) => write_output(path, &json, force),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(json.as_bytes())
                .context("write output to stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}

/// Refuses to replace an existing file unless `force` is set.
pub fn write_output(path: &str, contents: &str, force: bool) -> anyhow::Result<()> {
    if Path::new(path).exists() && !force {
        anyhow::bail!("output already exists (pass --force to overwrite): {path}");
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("open output: {path}"))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write output: {path}"))?;
    file.flush()
        .with_context(|| format!("flush output: {path}"))?;
    Ok(())
}
