use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::Result;
use crate::files::{list_images, prefixed_output};
use crate::pipeline::{FramePipeline, PipelineContext};

/// Counts reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

/// Runs every still image of a directory through one pipeline
pub struct ImageRunner {
    pipeline: FramePipeline,
    output_dir: PathBuf,
    save_intermediate: bool,
    verbose: bool,
}

impl ImageRunner {
    /// Creates `output_dir` if it does not exist
    pub fn new(pipeline: FramePipeline, output_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            pipeline,
            output_dir,
            save_intermediate: false,
            verbose: false,
        })
    }

    /// Also write each step's image next to the final output
    pub fn with_intermediates(mut self, save: bool) -> Self {
        self.save_intermediate = save;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process every image in `input_dir`
    pub fn run(&self, input_dir: &Path) -> Result<RunSummary> {
        let files = list_images(input_dir)?;
        info!("found {} images in {}", files.len(), input_dir.display());

        let mut summary = RunSummary::default();
        for file in &files {
            match self.process_file(file) {
                Ok(out) => {
                    info!("{} -> {}", file.display(), out.display());
                    summary.processed += 1;
                }
                Err(err) => {
                    warn!("failed on {}: {}", file.display(), err);
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Process one image and write `final_<name>`, returning its path
    pub fn process_file(&self, file: &Path) -> Result<PathBuf> {
        let frame = image::open(file)?.to_rgb8();

        let mut context = PipelineContext::new(self.verbose);
        if self.save_intermediate {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame".to_string());
            context = context.with_debug(&self.output_dir, stem);
        }

        let output = self.pipeline.process(frame, &context)?;
        if let Some(measurement) = &output.measurement {
            for line in measurement.readout() {
                info!("  {}", line);
            }
        }

        let out = prefixed_output(&self.output_dir, "final_", file);
        output.annotated.save(&out)?;
        Ok(out)
    }
}
