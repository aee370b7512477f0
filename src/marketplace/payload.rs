//! Payload documents submitted to the marketplace CLI.
//!
//! Each submission materializes its document as YAML in a [`PayloadFile`], a
//! named temporary file that lives exactly as long as the submission call and
//! is removed on every exit path, including errors.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::{AskPlanSettings, BidOrderSettings, TaskSettings};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct AskPlanSpec {
    pub duration: String,
    pub price: String,
    pub resources: AskResources,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResources {
    pub cpu: CpuResource,
    pub ram: RamResource,
    pub storage: StorageResource,
    pub gpu: GpuResource,
    pub network: NetworkResource,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuResource {
    pub cores: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RamResource {
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageResource {
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuResource {
    pub indexes: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkResource {
    pub throughputin: String,
    pub throughputout: String,
    pub overlay: bool,
    pub outbound: bool,
    pub incoming: bool,
}

impl AskPlanSpec {
    pub fn from_settings(settings: &AskPlanSettings) -> Self {
        Self {
            duration: settings.duration.clone(),
            price: settings.price.clone(),
            resources: AskResources {
                cpu: CpuResource {
                    cores: settings.cpu_cores,
                },
                ram: RamResource {
                    size: settings.ram_size.clone(),
                },
                storage: StorageResource { size: 0 },
                gpu: GpuResource { indexes: Vec::new() },
                network: NetworkResource {
                    throughputin: settings.throughput_in.clone(),
                    throughputout: settings.throughput_out.clone(),
                    overlay: settings.overlay,
                    outbound: settings.outbound,
                    incoming: settings.incoming,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BidOrderSpec {
    pub duration: String,
    pub price: String,
    pub net: NetFlags,
    pub benchmarks: Benchmarks,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetFlags {
    pub overlay: bool,
    pub outbound: bool,
    pub incoming: bool,
}

/// Fixed benchmark vector. Only `ram-size` and `cpu-cores` carry real values;
/// the marketplace requires the remaining slots to be present but zero.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Benchmarks {
    pub ram_size: u64,
    pub cpu_cores: u64,
    pub cpu_sysbench_multi: u64,
    pub cpu_sysbench_single: u64,
    pub net_download: u64,
    pub net_upload: u64,
    pub gpu_count: u64,
    pub gpu_mem: u64,
    pub gpu_eth_hashrate: u64,
}

impl BidOrderSpec {
    pub fn from_settings(settings: &BidOrderSettings) -> Self {
        Self {
            duration: settings.duration.clone(),
            price: settings.price.clone(),
            net: NetFlags {
                overlay: settings.overlay,
                outbound: settings.outbound,
                incoming: settings.incoming,
            },
            benchmarks: Benchmarks {
                ram_size: settings.ram_size,
                cpu_cores: settings.cpu_cores,
                cpu_sysbench_multi: 0,
                cpu_sysbench_single: 0,
                net_download: 0,
                net_upload: 0,
                gpu_count: 0,
                gpu_mem: 0,
                gpu_eth_hashrate: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSpec {
    pub container: ContainerSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerSpec {
    pub image: String,
    pub commit_on_stop: bool,
    pub env: BTreeMap<String, String>,
}

impl TaskSpec {
    /// Builds the task document, merging the environment file (if configured)
    /// over the inline environment.
    pub fn from_settings(settings: &TaskSettings) -> Result<Self> {
        let mut env = settings.env.clone();
        if let Some(path) = &settings.env_file {
            env.extend(load_env_file(path)?);
        }
        Ok(Self {
            container: ContainerSpec {
                image: settings.image.clone(),
                commit_on_stop: settings.commit_on_stop,
                env,
            },
        })
    }
}

/// Flat string-to-string mapping loaded from a YAML file.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents)
        .map_err(|e| Error::Parse(format!("malformed env file {}: {e}", path.display())))
}

/// A payload serialized into a named temporary file. Dropping the value
/// removes the file, so cleanup holds on success and on every error path.
pub struct PayloadFile {
    file: NamedTempFile,
}

impl PayloadFile {
    pub fn write_yaml<T: Serialize>(document: &T) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        let yaml = serde_yaml::to_string(document)?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
