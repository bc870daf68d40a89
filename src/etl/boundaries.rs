use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boundary::classify::AssignmentPolicy;
use crate::boundary::render::OutputFormat;
use crate::boundary::{BoundaryAssembler, LogObserver};
use crate::cache::{ByteCache, CacheKey, DirCache};
use crate::config::{ElementRef, FailurePolicy, UserConfig};
use crate::data::geometry::{BoundingBox, Document, Failure};
use crate::data::OsmMapData;
use crate::errors::Result;

use super::{parse_osm, Etl};

pub const ETL_NAME: &str = "boundaries";
pub const ELEMENT_CACHE_DIR: &str = "elements";
pub const BOUNDING_BOXES_FILE_NAME: &str = "bounding_boxes.json";
pub const FAILURES_FILE_NAME: &str = "failures.json";
pub const STAGE_CONFIG_FILE_NAME: &str = "boundaries_config.json";

/// The settings the outputs were built with. A run with different settings rebuilds them.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StageConfig {
    folder_name: String,
    elements: Vec<String>,
    formats: Vec<OutputFormat>,
    failure_policy: FailurePolicy,
    inner_ring_policy: AssignmentPolicy,
}

/// What gets cached per element between runs.
#[derive(Serialize, Deserialize)]
struct ElementBoundary {
    document: Document,
    bounding_boxes: Vec<BoundingBox>,
}

#[derive(Serialize, Debug)]
pub struct ElementBoxes {
    pub element: String,
    pub bounding_boxes: Vec<(f64, f64, f64, f64)>,
}

pub struct Input {
    data: OsmMapData,
    cache: DirCache,
}

pub struct Output {
    pub document: Document,
    pub bounding_boxes: Vec<ElementBoxes>,
    pub failures: Vec<Failure>,
}

pub struct BoundaryEtl<'a> {
    config: &'a UserConfig,
}

impl BoundaryEtl<'_> {
    pub fn new(config: &UserConfig) -> BoundaryEtl {
        BoundaryEtl { config }
    }

    fn output_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .config
            .formats
            .iter()
            .map(|format| dir.join(format.file_name()))
            .collect();
        paths.push(dir.join(BOUNDING_BOXES_FILE_NAME));
        paths.push(dir.join(FAILURES_FILE_NAME));
        paths.push(dir.join(STAGE_CONFIG_FILE_NAME));
        paths
    }

    fn stage_config(&self) -> StageConfig {
        StageConfig {
            folder_name: self.config.folder_name.clone(),
            elements: self.config.elements.iter().map(ElementRef::to_string).collect(),
            formats: self.config.formats.clone(),
            failure_policy: self.config.failure_policy,
            inner_ring_policy: self.config.inner_ring_policy,
        }
    }

    /// Assembled elements depend on the ring assignment policy, so each policy gets its own
    /// directory.
    fn element_cache(&self, dir: &Path) -> Result<DirCache> {
        let cache_dir = dir
            .join(ELEMENT_CACHE_DIR)
            .join(self.config.inner_ring_policy.as_str());
        DirCache::new(&cache_dir, "json")
    }

    fn assemble_cached(
        &self,
        assembler: &BoundaryAssembler,
        input: &Input,
        element: &ElementRef,
    ) -> Result<ElementBoundary> {
        let key = CacheKey::new(element.element_type, element.element_id);
        let compute = || -> Result<Vec<u8>> {
            let (document, bounding_boxes) =
                assembler.assemble(&input.data, element.element_type, element.element_id)?;
            Ok(serde_json::to_vec(&ElementBoundary {
                document,
                bounding_boxes,
            })?)
        };

        let bytes = input.cache.fetch_or_compute(&key, compute)?;
        match serde_json::from_slice(&bytes) {
            Ok(boundary) => Ok(boundary),
            Err(err) => {
                let message = err.to_string();
                warn!(
                    element_type = element.element_type.as_str(),
                    element_id = element.element_id,
                    err = message.as_str();
                    "Discarding unreadable cache entry"
                );
                input.cache.remove(&key)?;
                let bytes = input.cache.fetch_or_compute(&key, compute)?;
                Ok(serde_json::from_slice(&bytes)?)
            },
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

impl Etl for BoundaryEtl<'_> {
    type Input = Input;
    type Output = Output;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        for path in self.output_paths(dir) {
            if !path.try_exists()? {
                return Ok(false);
            }
        }
        let stored: Option<StageConfig> =
            serde_json::from_slice(&fs::read(dir.join(STAGE_CONFIG_FILE_NAME))?).ok();
        Ok(stored.as_ref() == Some(&self.stage_config()))
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for path in self.output_paths(dir) {
            if path.try_exists()? {
                fs::remove_file(path)?;
            }
        }
        DirCache::new(&dir.join(ELEMENT_CACHE_DIR), "json")?.clear()
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        Ok(Input {
            data: parse_osm::load_cached(dir)?,
            cache: self.element_cache(dir)?,
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let assembler = BoundaryAssembler::new(&self.config.folder_name)
            .with_policy(self.config.inner_ring_policy)
            .with_observer(LogObserver);

        let mut documents: Vec<Document> = Vec::new();
        let mut bounding_boxes: Vec<ElementBoxes> = Vec::new();
        let mut failures: Vec<Failure> = Vec::new();

        for element in tqdm::tqdm(self.config.elements.iter()) {
            match self.assemble_cached(&assembler, &input, element) {
                Ok(boundary) => {
                    bounding_boxes.push(ElementBoxes {
                        element: element.to_string(),
                        bounding_boxes: boundary.bounding_boxes.iter().map(BoundingBox::as_tuple).collect(),
                    });
                    documents.push(boundary.document);
                },
                Err(err) => {
                    if let Some(failure) = err.failure() {
                        failures.push(failure.clone());
                    }
                    if self.config.failure_policy == FailurePolicy::Abort {
                        return Err(err);
                    }
                    let message = err.to_string();
                    warn!(
                        element_type = element.element_type.as_str(),
                        element_id = element.element_id,
                        err = message.as_str();
                        "Skipping element"
                    );
                },
            }
        }

        info!(
            assembled = documents.len(),
            failed = self.config.elements.len() - documents.len();
            "Assembled boundaries"
        );
        Ok(Output {
            document: Document::merge(&self.config.folder_name, documents),
            bounding_boxes,
            failures,
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        for format in &self.config.formats {
            fs::write(dir.join(format.file_name()), output.document.render(*format)?)?;
        }
        write_json(&dir.join(BOUNDING_BOXES_FILE_NAME), &output.bounding_boxes)?;
        write_json(&dir.join(FAILURES_FILE_NAME), &output.failures)?;
        // Written last: its presence marks a complete set of outputs.
        write_json(&dir.join(STAGE_CONFIG_FILE_NAME), &self.stage_config())?;
        Ok(())
    }
}
