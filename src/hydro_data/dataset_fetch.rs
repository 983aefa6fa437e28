use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    process::Command,
    time::Instant,
};

use tracing::info;

/// Archive layout of the BD TOPO 3.0 hydrography delivery.
pub const ARCHIVE_NAME: &str = "BDTOPO_3-0_HYDROGRAPHIE_SHP_LAMB93_FXX_2020-09-15.7z";
pub const SHAPEFILE_PATH: &str = "BDTOPO_3-0_HYDROGRAPHIE_SHP_LAMB93_FXX_2020-09-15/BDTOPO/1_DONNEES_LIVRAISON_2020-09-00357/BDT_3-0_SHP_LAMB93_FXX_ED2020-09-15/HYDROGRAPHIE/TRONCON_HYDROGRAPHIQUE.shp";

#[derive(Debug, thiserror::Error)]
pub enum DatasetFetchError {
    #[error("{archive:?} is missing and no dataset URL was given")]
    MissingUrl { archive: PathBuf },

    #[error("Download failed: {error}")]
    Download { error: reqwest::Error },

    #[error("File error: {error}")]
    FileError { error: io::Error },

    #[error("Failed to run 7z: {error}")]
    ExtractSpawn { error: io::Error },

    #[error("7z exited with {status}")]
    ExtractFailed { status: std::process::ExitStatus },

    #[error("Archive extracted but {shapefile:?} is still missing")]
    ShapefileMissing { shapefile: PathBuf },
}

/// Makes the segment shapefile available under `work_dir`, downloading and unpacking
/// the archive when needed.
pub struct DatasetFetcher {
    work_dir: PathBuf,
    url: Option<String>,
}

impl DatasetFetcher {
    pub fn new(work_dir: PathBuf, url: Option<String>) -> Self {
        Self { work_dir, url }
    }

    pub fn shapefile_path(&self) -> PathBuf {
        self.work_dir.join(SHAPEFILE_PATH)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(ARCHIVE_NAME)
    }

    #[tracing::instrument(skip(self), fields(work_dir = ?self.work_dir))]
    pub fn fetch(&self) -> Result<PathBuf, DatasetFetchError> {
        let shapefile = self.shapefile_path();
        if shapefile.exists() {
            return Ok(shapefile);
        }

        let archive = self.archive_path();
        if !archive.exists() {
            let url = self
                .url
                .as_deref()
                .ok_or_else(|| DatasetFetchError::MissingUrl {
                    archive: archive.clone(),
                })?;
            download(url, &archive)?;
        }

        extract(&archive, &self.work_dir)?;
        if !shapefile.exists() {
            return Err(DatasetFetchError::ShapefileMissing { shapefile });
        }
        Ok(shapefile)
    }
}

fn download(url: &str, archive: &Path) -> Result<(), DatasetFetchError> {
    let download_start = Instant::now();
    info!(url, "Downloading dataset");

    let mut tmp_name = archive.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_file = PathBuf::from(tmp_name);

    let mut response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(|error| DatasetFetchError::Download { error })?;
    let mut file = File::create(&tmp_file).map_err(|error| DatasetFetchError::FileError { error })?;
    response
        .copy_to(&mut file)
        .map_err(|error| DatasetFetchError::Download { error })?;
    drop(file);
    std::fs::rename(&tmp_file, archive).map_err(|error| DatasetFetchError::FileError { error })?;

    info!(
        download_duration_secs = download_start.elapsed().as_secs(),
        "Download done"
    );
    Ok(())
}

/// 7z runs inside `work_dir`, so the archive is named relative to it.
fn extract_command(archive: &Path, work_dir: &Path) -> Command {
    let mut command = Command::new("7z");
    command
        .arg("x")
        .arg("-y")
        .arg(archive.file_name().unwrap_or(archive.as_os_str()))
        .current_dir(work_dir);
    command
}

fn extract(archive: &Path, work_dir: &Path) -> Result<(), DatasetFetchError> {
    info!(archive = ?archive, "Extracting dataset");
    let status = extract_command(archive, work_dir)
        .status()
        .map_err(|error| DatasetFetchError::ExtractSpawn { error })?;
    if !status.success() {
        return Err(DatasetFetchError::ExtractFailed { status });
    }
    Ok(())
}
