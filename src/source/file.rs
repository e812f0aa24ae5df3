//! Agent output stored in a file.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::parse_agent_output;
use crate::error::SourceError;
use crate::sections::RawSections;

/// Read the raw sections from a file holding the plain-text output of an agent.
///
/// An empty file yields no sections. A non-empty file without a single
/// section header is an error.
pub fn read_agent_output(path: &Path) -> Result<RawSections, SourceError> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sections = parse_agent_output(&content);
    if sections.is_empty() && !content.trim().is_empty() {
        return Err(SourceError::NoSections {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), sections = sections.len(), "Read agent output");
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkengine_types::SectionName;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_agent_output() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<<<mem>>>\nused 70\ntotal 100\n<<<uptime>>>\n12345.6\n").unwrap();

        let sections = read_agent_output(file.path()).unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections.contains_key(&SectionName::new("mem").unwrap()));
        assert!(sections.contains_key(&SectionName::new("uptime").unwrap()));

        // Reading again gives the same data
        assert_eq!(read_agent_output(file.path()).unwrap(), sections);
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(read_agent_output(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = read_agent_output(Path::new("/nonexistent/path/agent.txt")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert!(err.to_string().starts_with("agent output /nonexistent/path/agent.txt"));
    }

    #[test]
    fn test_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not agent output").unwrap();

        let err = read_agent_output(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::NoSections { .. }));
    }
}
