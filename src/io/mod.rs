use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;

use crate::error::RewriteError;

pub mod attributes;
pub mod population;
pub mod vehicles;

pub fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq("gz"))
}

/// Opens a population-style file for reading, transparently decompressing
/// `.xml.gz` input.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, RewriteError> {
    let file = File::open(path).map_err(|source| RewriteError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    let reader: Box<dyn BufRead> = if is_gzipped(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Deserializes a whole document, e.g. the vehicle definitions registry.
pub fn read_from_file<T>(path: &Path) -> Result<T, RewriteError>
where
    T: DeserializeOwned,
{
    let reader = open_reader(path)?;
    let mut de = quick_xml::de::Deserializer::from_reader(reader);
    serde_path_to_error::deserialize(&mut de)
        .map_err(|err| RewriteError::Parse(format!("{path:?}: {err}")))
}

/// Output sink for the rewritten population. Gzip compression is chosen by
/// file extension, as for all other MATSim file formats.
pub enum PopulationSink {
    Plain(BufWriter<File>),
    Gzipped(GzEncoder<BufWriter<File>>),
}

impl PopulationSink {
    pub fn create(path: &Path) -> Result<Self, RewriteError> {
        if let Some(prefix) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(prefix)?;
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        if is_gzipped(path) {
            Ok(PopulationSink::Gzipped(GzEncoder::new(
                writer,
                Compression::fast(),
            )))
        } else {
            Ok(PopulationSink::Plain(writer))
        }
    }

    /// Flushes all buffered data and writes the gzip trailer if necessary.
    pub fn finish(self) -> Result<(), RewriteError> {
        match self {
            PopulationSink::Plain(mut writer) => writer.flush()?,
            PopulationSink::Gzipped(encoder) => {
                encoder.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

impl Write for PopulationSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            PopulationSink::Plain(writer) => writer.write(buf),
            PopulationSink::Gzipped(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            PopulationSink::Plain(writer) => writer.flush(),
            PopulationSink::Gzipped(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::path::PathBuf;

    use crate::error::RewriteError;
    use crate::io::{open_reader, read_from_file, PopulationSink};
    use crate::io::population::IOPopulation;

    #[test]
    fn open_missing_file() {
        let result = open_reader(&PathBuf::from("./does/not/exist.xml"));
        assert!(matches!(result, Err(RewriteError::OpenFile { .. })));
    }

    #[test]
    fn read_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(&path, "<population><person id=").unwrap();

        let result: Result<IOPopulation, _> = read_from_file(&path);
        assert!(matches!(result, Err(RewriteError::Parse(_))));
    }

    #[test]
    fn gzipped_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml.gz");

        let mut sink = PopulationSink::create(&path).unwrap();
        sink.write_all(b"<population></population>").unwrap();
        sink.finish().unwrap();

        let mut content = String::new();
        open_reader(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!("<population></population>", content);
    }
}
