//! Link-time dependency names recorded in a shared object
//!
//! Only ELF is read. Other formats yield no names: Windows already searches
//! the module directory through its load flags.

use object::read::elf::{Dyn, FileHeader};
use object::{elf, Endianness, FileKind};
use std::path::Path;
use tracing::debug;

/// `DT_SONAME` and `DT_NEEDED` entries of a shared object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedNames {
    pub soname: Option<String>,
    pub needed: Vec<String>,
}

impl LinkedNames {
    /// Read the names from the file at `path`; unreadable files yield none
    pub fn read(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(data) => Self::parse(&data),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot read shared object");
                Self::default()
            }
        }
    }

    pub fn parse(data: &[u8]) -> Self {
        let parsed = match FileKind::parse(data) {
            Ok(FileKind::Elf32) => dynamic_names::<elf::FileHeader32<Endianness>>(data),
            Ok(FileKind::Elf64) => dynamic_names::<elf::FileHeader64<Endianness>>(data),
            _ => return Self::default(),
        };
        parsed.unwrap_or_else(|e| {
            debug!(error = %e, "Malformed dynamic section");
            Self::default()
        })
    }
}

fn dynamic_names<Elf>(data: &[u8]) -> object::Result<LinkedNames>
where
    Elf: FileHeader<Endian = Endianness>,
{
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    let sections = header.sections(endian, data)?;

    let mut names = LinkedNames::default();
    let Some((entries, link)) = sections.dynamic(endian, data)? else {
        return Ok(names);
    };
    let strings = sections.strings(endian, data, link)?;

    for entry in entries {
        let tag = entry.tag32(endian);
        if tag != Some(elf::DT_NEEDED) && tag != Some(elf::DT_SONAME) {
            continue;
        }
        let name = String::from_utf8_lossy(entry.string(endian, strings)?).into_owned();
        if tag == Some(elf::DT_SONAME) {
            names.soname = Some(name);
        } else {
            names.needed.push(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_elf_input_has_no_names() {
        assert_eq!(LinkedNames::parse(b"MZ not an elf file"), LinkedNames::default());
        assert_eq!(LinkedNames::parse(&[]), LinkedNames::default());
    }

    #[test]
    fn test_truncated_elf_has_no_names() {
        let header = b"\x7fELF\x02\x01\x01\x00";
        assert_eq!(LinkedNames::parse(header), LinkedNames::default());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_reads_needed_entries_of_running_binary() {
        let exe = std::env::current_exe().unwrap();
        let names = LinkedNames::read(&exe);
        assert!(
            names.needed.iter().any(|n| n.starts_with("libc.so")),
            "expected libc in {:?}",
            names.needed
        );
    }
}
