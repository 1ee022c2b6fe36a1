use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;
use trajgen_core::SamplingPolicy;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Enums for Choices ---
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Pickle,
    Json,
    Binary,
}

// --- Configuration Sections ---

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DomainSettings {
    #[serde(default = "default_box_size")]
    pub box_size: [f64; 3],
    #[serde(default)]
    pub periodic: [bool; 3],
    /// Lower corner of the confinement region.
    #[serde(default = "default_origin")]
    pub origin: [f64; 3],
    #[serde(default = "default_extent")]
    pub extent: [f64; 3],
    #[serde(default = "default_box_force_constant")]
    pub box_force_constant: f64,
}

fn default_box_size() -> [f64; 3] { [50.0, 50.0, 5.0] }
fn default_origin() -> [f64; 3] { [-23.0, -23.0, -0.001] }
fn default_extent() -> [f64; 3] { [46.0, 46.0, 0.002] }
fn default_box_force_constant() -> f64 { 1.0 }

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            box_size: default_box_size(),
            periodic: [false; 3],
            origin: default_origin(),
            extent: default_extent(),
            box_force_constant: default_box_force_constant(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SpeciesConfig {
    pub name: String,
    pub diffusion_constant: f64,
    pub count: usize,
    #[serde(default)]
    pub sampling: SamplingPolicy,
}

impl SpeciesConfig {
    pub fn new(name: &str, diffusion_constant: f64, count: usize, sampling: SamplingPolicy) -> Self {
        Self {
            name: name.to_string(),
            diffusion_constant,
            count,
            sampling,
        }
    }
}

/// Potentials beyond the per-species box confinement.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PotentialConfig {
    ExclusionSphere {
        species: String,
        force_constant: f64,
        #[serde(default)]
        origin: [f64; 3],
        radius: f64,
    },
    SphericalBarrier {
        species: String,
        height: f64,
        width: f64,
        #[serde(default)]
        origin: [f64; 3],
        radius: f64,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RunSettings {
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_n_steps")]
    pub n_steps: u64,
    #[serde(default = "default_stride")]
    pub stride: u64,
    /// Nominal particle diameter, only used for rendering.
    #[serde(default = "default_interaction_distance")]
    pub interaction_distance: f64,
    #[serde(default = "default_replicates")]
    pub replicates: u32,
    /// Supports `{run}` (1-based replicate) and `{total}` (particle count).
    #[serde(default = "default_label_template")]
    pub label_template: String,
    /// Base seed. Drawn from entropy and logged when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_kbt")]
    pub kbt: f64,
    #[serde(default)]
    pub parallel: bool,
}

fn default_dt() -> f64 { 0.01 }
fn default_n_steps() -> u64 { 999 }
fn default_stride() -> u64 { 1 }
fn default_interaction_distance() -> f64 { 1.0 }
fn default_replicates() -> u32 { 1 }
fn default_label_template() -> String { "Sims_numPart_{total}_run_{run}_".to_string() }
fn default_kbt() -> f64 { 2.437 }

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            n_steps: default_n_steps(),
            stride: default_stride(),
            interaction_distance: default_interaction_distance(),
            replicates: default_replicates(),
            label_template: default_label_template(),
            seed: None,
            kbt: default_kbt(),
            parallel: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputSettings {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub archive_format: ArchiveFormat,
    #[serde(default = "default_true")]
    pub plot: bool,
    #[serde(default = "default_true")]
    pub visualization: bool,
    #[serde(default = "default_true")]
    pub manifest: bool,
}

fn default_directory() -> PathBuf { PathBuf::from(".") }
fn default_true() -> bool { true }

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            archive_format: ArchiveFormat::default(),
            plot: true,
            visualization: true,
            manifest: true,
        }
    }
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub domain: DomainSettings,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub potentials: Vec<PotentialConfig>,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config::single_species()
    }
}

// --- Helper Methods ---

impl Config {
    /// One species `A` (D = 0.5, 100 particles) under a stiff box.
    pub fn single_species() -> Self {
        Self {
            domain: DomainSettings {
                box_force_constant: 50.0,
                ..DomainSettings::default()
            },
            species: vec![SpeciesConfig::new("A", 0.5, 100, SamplingPolicy::Domain)],
            potentials: Vec::new(),
            run: RunSettings {
                replicates: 5,
                label_template: "Sims_D_0p5_numPart_{total}_run_{run}_".to_string(),
                ..RunSettings::default()
            },
            output: OutputSettings::default(),
        }
    }

    /// Brownian, ring-confined, immobile and directed species with a trench
    /// and a repulsive mountain.
    pub fn multi_species() -> Self {
        Self {
            domain: DomainSettings::default(),
            species: vec![
                SpeciesConfig::new("Brown", 0.5, 73, SamplingPolicy::Domain),
                SpeciesConfig::new("Confined", 0.5, 15, SamplingPolicy::ring()),
                SpeciesConfig::new("Immob", 0.00003, 5, SamplingPolicy::Domain),
                SpeciesConfig::new("Direct", 1.0, 6, SamplingPolicy::sub_box()),
            ],
            potentials: vec![
                PotentialConfig::ExclusionSphere {
                    species: "Direct".to_string(),
                    force_constant: 4.0,
                    origin: [0.0; 3],
                    radius: 35.0,
                },
                PotentialConfig::SphericalBarrier {
                    species: "Confined".to_string(),
                    height: -15.0,
                    width: 5.0,
                    origin: [0.0; 3],
                    radius: 10.0,
                },
            ],
            run: RunSettings {
                replicates: 10,
                label_template: "Multi_Sims_D_ALL_numPart_{total}_run_{run}_".to_string(),
                ..RunSettings::default()
            },
            output: OutputSettings::default(),
        }
    }

    pub fn total_particles(&self) -> usize {
        self.species.iter().map(|s| s.count).sum()
    }

    pub fn species_names(&self) -> Vec<String> {
        self.species.iter().map(|s| s.name.clone()).collect()
    }

    /// Output label of replicate `run` (1-based).
    pub fn label(&self, run: u32) -> String {
        self.run
            .label_template
            .replace("{run}", &run.to_string())
            .replace("{total}", &self.total_particles().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.species.is_empty() {
            return Err(ConfigError::Validation("At least one species is required.".to_string()));
        }
        for (i, species) in self.species.iter().enumerate() {
            if species.name.trim().is_empty() {
                return Err(ConfigError::Validation("Species names cannot be empty.".to_string()));
            }
            if self.species[..i].iter().any(|s| s.name == species.name) {
                return Err(ConfigError::Validation(format!(
                    "Species '{}' is listed twice.",
                    species.name
                )));
            }
        }
        if !(self.run.dt.is_finite() && self.run.dt > 0.0) {
            return Err(ConfigError::Validation("Timestep must be positive.".to_string()));
        }
        if self.run.n_steps == 0 {
            return Err(ConfigError::Validation("Step count cannot be zero.".to_string()));
        }
        if self.run.stride == 0 {
            return Err(ConfigError::Validation("Stride cannot be zero.".to_string()));
        }
        if self.run.replicates == 0 {
            return Err(ConfigError::Validation("Replicate count cannot be zero.".to_string()));
        }
        if !(self.run.interaction_distance.is_finite() && self.run.interaction_distance > 0.0) {
            return Err(ConfigError::Validation("Interaction distance must be positive.".to_string()));
        }
        if !(self.run.kbt.is_finite() && self.run.kbt > 0.0) {
            return Err(ConfigError::Validation("kbt must be positive.".to_string()));
        }
        // Distinct replicates need distinct output paths.
        if self.run.replicates > 1 && !self.run.label_template.contains("{run}") {
            return Err(ConfigError::Validation(
                "label_template must contain {run} when running several replicates.".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Loading Function ---

/// Reads a JSON or TOML (by extension) configuration file and validates it.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: Config = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    debug!("Parsed configuration from {}", path.display());

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_minimal_json_uses_reference_defaults() {
        let content = r#"{
          "species": [ { "name": "A", "diffusion_constant": 0.5, "count": 100 } ]
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.dt, 0.01);
        assert_eq!(config.run.n_steps, 999);
        assert_eq!(config.run.interaction_distance, 1.0);
        assert_eq!(config.run.stride, 1);
        assert_eq!(config.domain.box_size, [50.0, 50.0, 5.0]);
        assert_eq!(config.domain.extent, [46.0, 46.0, 0.002]);
        assert_eq!(config.species[0].sampling, SamplingPolicy::Domain);
        assert_eq!(config.output.archive_format, ArchiveFormat::Pickle);
    }

    #[test]
    fn load_toml_with_policies_and_potentials() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("multi.toml");
        file.write_str(
            r#"
            [run]
            seed = 7
            replicates = 2
            label_template = "Multi_{total}_run_{run}_"

            [[species]]
            name = "Confined"
            diffusion_constant = 0.5
            count = 15
            sampling = { kind = "ring", radius = 10.0 }

            [[species]]
            name = "Direct"
            diffusion_constant = 1.0
            count = 6
            sampling = { kind = "sub_box" }

            [[potentials]]
            kind = "exclusion_sphere"
            species = "Direct"
            force_constant = 4.0
            radius = 35.0
            "#,
        )
        .unwrap();
        assert!(file.path().exists());

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.run.seed, Some(7));
        assert_eq!(
            config.species[0].sampling,
            SamplingPolicy::Ring { radius: 10.0, noise: 1.0 }
        );
        assert_eq!(config.species[1].sampling, SamplingPolicy::SubBox { fraction: 0.25 });
        assert_eq!(config.potentials.len(), 1);
        assert_eq!(config.label(2), "Multi_21_run_2_");
    }

    #[test]
    fn load_invalid_timestep() {
        let content = r#"{
          "species": [ { "name": "A", "diffusion_constant": 0.5, "count": 10 } ],
          "run": { "dt": 0.0 }
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_species_and_shared_labels() {
        let mut config = Config::single_species();
        config.species.push(config.species[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::single_species();
        config.run.label_template = "fixed".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn presets_match_reference_scripts() {
        let single = Config::default();
        single.validate().unwrap();
        assert_eq!(single.total_particles(), 100);
        assert_eq!(single.domain.box_force_constant, 50.0);
        assert_eq!(single.label(1), "Sims_D_0p5_numPart_100_run_1_");

        let multi = Config::multi_species();
        multi.validate().unwrap();
        assert_eq!(multi.total_particles(), 99);
        assert_eq!(multi.run.replicates, 10);
        assert_eq!(multi.label(3), "Multi_Sims_D_ALL_numPart_99_run_3_");
    }

    #[test]
    fn bundled_configs_match_presets() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs");

        let single = load_config(&dir.join("single_species.toml")).unwrap();
        assert_eq!(single.species, Config::single_species().species);
        assert_eq!(single.run.label_template, Config::single_species().run.label_template);

        let multi = load_config(&dir.join("multi_species.json")).unwrap();
        assert_eq!(multi.species, Config::multi_species().species);
        assert_eq!(multi.potentials, Config::multi_species().potentials);
        assert!(multi.run.parallel);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
