pub mod boundaries;
pub mod parse_osm;

use std::path::Path;
use std::time::Instant;

use log::{error, info};

use crate::errors::Result;

/// One cached step of the pipeline. Output lives under `dir`; when it is already there the
/// step is skipped entirely.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path, refresh: bool) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        info!(etl_name = etl_name.as_str(); "Starting ETL process");

        if refresh {
            info!(etl_name = etl_name.as_str(); "Dropping cached output");
            self.clean(dir)?;
        } else if self.is_cached(dir)? {
            info!(etl_name = etl_name.as_str(); "Using cached value");
            return Ok(());
        }

        let started = Instant::now();
        let input = logged(&etl_name, "extract", self.extract(dir))?;
        let output = logged(&etl_name, "transform", self.transform(input))?;
        logged(&etl_name, "load", self.load(dir, output))?;

        info!(
            etl_name = etl_name.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64;
            "Process finished"
        );
        Ok(())
    }
}

fn logged<T>(etl_name: &str, stage: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => info!(etl_name = etl_name, stage = stage; "Stage finished"),
        Err(err) => {
            let err = err.to_string();
            error!(etl_name = etl_name, stage = stage, err = err.as_str(); "Stage failed with error");
        },
    }
    result
}
