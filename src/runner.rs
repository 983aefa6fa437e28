use std::{convert::Infallible, path::PathBuf, time::Instant};

use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, Level};

use crate::{
    hydro_data::{
        self,
        dataset_fetch::{DatasetFetchError, DatasetFetcher},
        projection::{ProjectionError, SourceCrs},
        HydroDataError, HydroDataReader, HydroFeatures,
    },
    map_data::{
        builder::{MapDataBuildError, MapDataBuilder},
        graph::MapDataGraph,
        tags::ValueCache,
    },
    merge::WayMerger,
    network::river::{RiverExtractor, RiverSchema},
    osm_data::{
        self, data_reader::OsmDataReader, xml_writer::OsmXmlWriter, DataDestination,
        OsmDataReaderError, OsmWriterError,
    },
    tagging::{
        engine::TagEngine,
        rules::{RulesError, TagRules},
        TaggingError,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Input file {filename:?} is not .osm, .osm.gz, .shp, .geojson or .json")]
    InputFileFormatIncorrect { filename: PathBuf },

    #[error("Rules error: {error}")]
    Rules { error: RulesError },

    #[error("Source data error: {error}")]
    HydroData { error: HydroDataError },

    #[error("Dataset error: {error}")]
    DatasetFetch { error: DatasetFetchError },

    #[error("Projection error: {error}")]
    Projection { error: ProjectionError },

    #[error("Graph build error: {error}")]
    Build { error: MapDataBuildError },

    #[error("OSM read error: {error}")]
    OsmRead { error: OsmDataReaderError },

    #[error("OSM write error: {error}")]
    OsmWrite { error: OsmWriterError },

    #[error("Tagging error: {error}")]
    Tagging { error: TaggingError },

    #[cfg(feature = "rule-schema-writer")]
    #[error("Schema error: {error}")]
    Schema { error: serde_json::Error },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// -v for debug output, -vv for trace output
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    pub mode: CliMode,
}

#[derive(Subcommand)]
enum CliMode {
    /// Extracts a river and its tributaries from the segment dataset
    Extract {
        /// River name (accents and case ignored) or exact canonical code
        #[arg(value_name = "SEARCH")]
        search: String,

        /// Segment shapefile; the BD TOPO archive is fetched when omitted
        #[arg(long, value_name = "FILE")]
        shp: Option<PathBuf>,

        #[arg(long, value_name = "PROJ", value_parser = parse_source_crs)]
        source_crs: Option<SourceCrs>,

        /// http(s) URL of the BD TOPO hydrography archive, used when --shp is omitted.
        /// There is no built-in URL: this flag or BDHYDRO_DATASET_URL is required to fetch.
        /// The credentialed ftp:// URL published by IGN cannot be fetched, mirror it over http(s)
        #[arg(long, value_name = "URL", env = "BDHYDRO_DATASET_URL")]
        dataset_url: Option<String>,

        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
    },
    /// Converts source attributes to OSM tags and merges consecutive ways
    Convert {
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,

        #[arg(long, value_name = "PROJ", value_parser = parse_source_crs)]
        source_crs: Option<SourceCrs>,

        #[arg(long)]
        no_merge: bool,
    },
    #[cfg(feature = "rule-schema-writer")]
    /// Prints the JSON schema of rule files
    RulesSchema,
}

#[derive(Debug, PartialEq, Clone)]
pub enum InputSource {
    Osm(osm_data::DataSource),
    Hydro(hydro_data::DataSource),
}

#[derive(Debug)]
pub enum RunnerMode {
    Extract {
        search: String,
        shapefile: Option<PathBuf>,
        source_crs: Option<SourceCrs>,
        dataset_url: Option<String>,
        output_dir: PathBuf,
    },
    Convert {
        input: InputSource,
        destination: DataDestination,
        rule_file: Option<PathBuf>,
        source_crs: Option<SourceCrs>,
        merge: bool,
    },
    #[cfg(feature = "rule-schema-writer")]
    RulesSchema,
}

pub struct Runner {
    mode: RunnerMode,
    verbose: u8,
}

impl Runner {
    pub fn init() -> Result<Self, RunnerError> {
        let cli = Cli::parse();
        let mode = match cli.mode {
            CliMode::Extract {
                search,
                shp,
                source_crs,
                dataset_url,
                output_dir,
            } => RunnerMode::Extract {
                search,
                shapefile: shp,
                source_crs,
                dataset_url,
                output_dir,
            },
            CliMode::Convert {
                input,
                output,
                rules,
                source_crs,
                no_merge,
            } => RunnerMode::Convert {
                input: get_input_source(input)?,
                destination: get_data_destination(output),
                rule_file: rules,
                source_crs,
                merge: !no_merge,
            },
            #[cfg(feature = "rule-schema-writer")]
            CliMode::RulesSchema => RunnerMode::RulesSchema,
        };

        Ok(Self {
            mode,
            verbose: cli.verbose,
        })
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    fn read_features(
        source: hydro_data::DataSource,
        source_crs: Option<SourceCrs>,
    ) -> Result<HydroFeatures, RunnerError> {
        HydroDataReader::new(source, source_crs)
            .read()
            .map_err(|error| RunnerError::HydroData { error })
    }

    #[tracing::instrument(skip_all)]
    fn build_graph<'f>(
        hydro: &HydroFeatures,
        features: impl Iterator<Item = (usize, &'f hydro_data::feature::RawFeature)> + Clone,
        cache: &mut ValueCache,
    ) -> Result<MapDataGraph, RunnerError> {
        let transform = hydro
            .crs
            .transform()
            .map_err(|error| RunnerError::Projection { error })?;
        MapDataBuilder::new(&*transform, cache)
            .build(features)
            .map_err(|error| RunnerError::Build { error })
    }

    fn write_graph(graph: &MapDataGraph, destination: &DataDestination) -> Result<(), RunnerError> {
        OsmXmlWriter::new(graph)
            .write(destination)
            .map_err(|error| RunnerError::OsmWrite { error })
    }

    #[tracing::instrument]
    fn run_extract(
        search: &str,
        shapefile: Option<PathBuf>,
        source_crs: Option<SourceCrs>,
        dataset_url: Option<String>,
        output_dir: &PathBuf,
    ) -> Result<(), RunnerError> {
        let start = Instant::now();
        let shapefile = match shapefile {
            Some(shapefile) => shapefile,
            None => DatasetFetcher::new(output_dir.clone(), dataset_url)
                .fetch()
                .map_err(|error| RunnerError::DatasetFetch { error })?,
        };
        let hydro = Self::read_features(
            hydro_data::DataSource::Shapefile { file: shapefile },
            source_crs,
        )?;

        let extract = RiverExtractor::new(&hydro.features, RiverSchema::default()).extract(search);
        let mut cache = ValueCache::new();

        let main = Self::build_graph(
            &hydro,
            extract.main.iter().map(|&idx| (idx, &hydro.features[idx])),
            &mut cache,
        )?;
        let main_file = output_dir.join(format!("{} - main.osm.gz", extract.file_prefix()));
        Self::write_graph(&main, &DataDestination::File { file: main_file })?;

        let network_features = extract.network();
        let network = Self::build_graph(
            &hydro,
            network_features
                .iter()
                .map(|&idx| (idx, &hydro.features[idx])),
            &mut cache,
        )?;
        let tributary_file =
            output_dir.join(format!("{} - tributary.osm.gz", extract.file_prefix()));
        Self::write_graph(&network, &DataDestination::File { file: tributary_file })?;

        info!(
            seeds = extract.seeds.len(),
            main = extract.main.len(),
            tributary = extract.tributary.len(),
            elapsed = ?start.elapsed(),
            "Extract done"
        );
        Ok(())
    }

    #[tracing::instrument]
    fn run_convert(
        input: &InputSource,
        destination: &DataDestination,
        rule_file: Option<PathBuf>,
        source_crs: Option<SourceCrs>,
        merge: bool,
    ) -> Result<(), RunnerError> {
        let start = Instant::now();
        let rules = TagRules::read(rule_file)
            .and_then(|rules| rules.compile())
            .map_err(|error| RunnerError::Rules { error })?;
        let mut cache = ValueCache::new();

        let mut graph = match input {
            InputSource::Osm(source) => OsmDataReader::new(source.clone())
                .read_data()
                .map_err(|error| RunnerError::OsmRead { error })?,
            InputSource::Hydro(source) => {
                let hydro = Self::read_features(source.clone(), source_crs)?;
                Self::build_graph(&hydro, hydro.features.iter().enumerate(), &mut cache)?
            }
        };

        TagEngine::new(rules)
            .apply_all(&mut graph, &mut cache)
            .map_err(|error| RunnerError::Tagging { error })?;

        if merge {
            info!(length_km = graph.total_length() / 1000., "Length before merge");
            let report = WayMerger::new(&mut graph).merge();
            info!(
                length_km = graph.total_length() / 1000.,
                merged = report.merged,
                loops = report.loops.len(),
                "Length after merge"
            );
        }

        Self::write_graph(&graph, destination)?;
        info!(elapsed = ?start.elapsed(), "Convert done");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn run(&self) -> Result<(), RunnerError> {
        match &self.mode {
            RunnerMode::Extract {
                search,
                shapefile,
                source_crs,
                dataset_url,
                output_dir,
            } => Self::run_extract(
                search,
                shapefile.clone(),
                source_crs.clone(),
                dataset_url.clone(),
                output_dir,
            ),
            RunnerMode::Convert {
                input,
                destination,
                rule_file,
                source_crs,
                merge,
            } => Self::run_convert(
                input,
                destination,
                rule_file.clone(),
                source_crs.clone(),
                *merge,
            ),
            #[cfg(feature = "rule-schema-writer")]
            RunnerMode::RulesSchema => {
                let schema = crate::tagging::rules::rules_json_schema()
                    .map_err(|error| RunnerError::Schema { error })?;
                println!("{schema}");
                Ok(())
            }
        }
    }
}

/// `wgs84` / `EPSG:4326`, `lambert93` / `EPSG:2154`, or a proj4 definition.
fn parse_source_crs(value: &str) -> Result<SourceCrs, Infallible> {
    Ok(match value.to_ascii_lowercase().as_str() {
        "wgs84" | "epsg:4326" => SourceCrs::Wgs84,
        "lambert93" | "epsg:2154" => SourceCrs::lambert_93(),
        _ => SourceCrs::Proj4 {
            definition: value.to_string(),
        },
    })
}

fn get_input_source(file: Option<PathBuf>) -> Result<InputSource, RunnerError> {
    let file = match file {
        None => return Ok(InputSource::Osm(osm_data::DataSource::Stdin)),
        Some(file) => file,
    };
    let is_osm_gz = file
        .file_name()
        .map_or(false, |name| name.to_string_lossy().ends_with(".osm.gz"));
    if is_osm_gz {
        return Ok(InputSource::Osm(osm_data::DataSource::GzXmlFile { file }));
    }
    if let Some(ext) = file.extension() {
        if ext == "osm" {
            return Ok(InputSource::Osm(osm_data::DataSource::XmlFile { file }));
        } else if ext == "shp" {
            return Ok(InputSource::Hydro(hydro_data::DataSource::Shapefile {
                file,
            }));
        } else if ext == "geojson" || ext == "json" {
            return Ok(InputSource::Hydro(hydro_data::DataSource::GeoJson { file }));
        }
    }
    Err(RunnerError::InputFileFormatIncorrect { filename: file })
}

fn get_data_destination(file: Option<PathBuf>) -> DataDestination {
    match file {
        Some(file) => DataDestination::File { file },
        None => DataDestination::Stdout,
    }
}
