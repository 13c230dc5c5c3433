//! Local HDF5 files via the HDF5 library.

use crate::store::{clip_selection, AxisSlice, DataStore, StoreLocation};
use crate::{Error, Result};
use gridsite_core::{MetaColumn, SiteMeta};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File, Hyperslab, Location, Selection, SliceOrIndex};
use ndarray::{ArrayD, IxDyn};
use std::path::Path;

/// Width of the buffer fixed-length strings are converted into.
const FIXED_STRING_WIDTH: usize = 256;

/// Read-only HDF5 file.
pub struct Hdf5Store {
    file: File,
    location: StoreLocation,
}

impl Hdf5Store {
    /// Opens a resource.
    ///
    /// Only local files are readable through the HDF5 library; `hdf5://`,
    /// `s3://` and `http(s)://` locations are recognised and refused.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the file does not exist,
    /// [`Error::Access`] for remote locations or unreadable files.
    pub fn open(path: &str) -> Result<Self> {
        let location = StoreLocation::parse(path);
        match &location {
            StoreLocation::Posix(p) => {
                let file = open_local(Path::new(p))?;
                log::debug!("opened {location}");
                Ok(Self { file, location })
            }
            other => {
                log::warn!("refusing {other}: only local HDF5 files are supported");
                Err(Error::Access(format!(
                    "{} driver is not available for {}",
                    other.driver(),
                    other.as_str()
                )))
            }
        }
    }

    /// Location this store was opened from.
    #[must_use]
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Chunk shape of a variable, `None` for contiguous layout.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unknown variables.
    pub fn chunks(&self, name: &str) -> Result<Option<Vec<usize>>> {
        Ok(self.dataset(name)?.chunk())
    }

    fn dataset(&self, name: &str) -> Result<Dataset> {
        if !self.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        self.file
            .dataset(name)
            .map_err(|e| Error::read(name, e))
    }
}

fn open_local(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    File::open(path).map_err(|e| Error::Access(format!("{}: {e}", path.display())))
}

impl DataStore for Hdf5Store {
    fn contains(&self, name: &str) -> bool {
        self.file.link_exists(name)
    }

    fn variables(&self) -> Result<Vec<String>> {
        Ok(self.file.member_names()?)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>> {
        Ok(self.dataset(name)?.shape())
    }

    fn read_slice(&self, name: &str, selection: &[AxisSlice]) -> Result<ArrayD<f64>> {
        let dataset = self.dataset(name)?;
        let selection = clip_selection(name, &dataset.shape(), selection)?;

        // Empty selections never reach the library.
        if selection.iter().any(|s| s.count() == 0) {
            let shape: Vec<usize> = selection.iter().map(AxisSlice::count).collect();
            return Ok(ArrayD::zeros(IxDyn(&shape)));
        }

        let slices: Vec<SliceOrIndex> = selection
            .iter()
            .map(|s| SliceOrIndex::SliceTo {
                start: s.start,
                step: s.step,
                end: s.stop,
                block: false,
            })
            .collect();
        dataset
            .read_slice::<f64, _, IxDyn>(Selection::from(Hyperslab::from(slices)))
            .map_err(|e| Error::read(name, e))
    }

    fn read_all(&self, name: &str) -> Result<ArrayD<f64>> {
        self.dataset(name)?
            .read_dyn::<f64>()
            .map_err(|e| Error::read(name, e))
    }

    fn read_strings(&self, name: &str) -> Result<Vec<String>> {
        read_string_dataset(&self.dataset(name)?, name)
    }

    /// Reads a table stored as a group with one 1-d dataset per column.
    ///
    /// A table stored as a single compound-typed dataset is not decoded and
    /// returns [`Error::Read`]; such files need converting to the column
    /// group layout first.
    fn read_table(&self, name: &str) -> Result<SiteMeta> {
        if !self.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        let group = self.file.group(name).map_err(|e| {
            Error::read(name, format!("tables are read from column groups: {e}"))
        })?;

        let mut table = SiteMeta::default();
        for column in group.member_names()? {
            let dataset = group.dataset(&column)?;
            let value = if is_string_type(&dataset)? {
                MetaColumn::Text(read_string_dataset(&dataset, &column)?)
            } else {
                MetaColumn::Numeric(
                    dataset
                        .read_raw::<f64>()
                        .map_err(|e| Error::read(&column, e))?,
                )
            };
            table.insert(column, value)?;
        }
        log::debug!("read table {name}: {} rows", table.len());
        Ok(table)
    }

    fn attr_f64(&self, name: &str, attr: &str) -> Result<Option<f64>> {
        read_attr_opt(&self.dataset(name)?, attr)
    }
}

fn read_attr_opt(location: &Location, name: &str) -> Result<Option<f64>> {
    match location.attr(name) {
        Ok(attr) => Ok(Some(attr.read_scalar::<f64>()?)),
        Err(_) => Ok(None),
    }
}

fn is_string_type(dataset: &Dataset) -> Result<bool> {
    Ok(matches!(
        dataset.dtype()?.to_descriptor()?,
        TypeDescriptor::FixedAscii(_)
            | TypeDescriptor::FixedUnicode(_)
            | TypeDescriptor::VarLenAscii
            | TypeDescriptor::VarLenUnicode
    ))
}

fn read_string_dataset(dataset: &Dataset, name: &str) -> Result<Vec<String>> {
    let descriptor = dataset.dtype()?.to_descriptor()?;
    let values: Vec<String> = match descriptor {
        TypeDescriptor::VarLenUnicode => dataset
            .read_raw::<VarLenUnicode>()
            .map_err(|e| Error::read(name, e))?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::VarLenAscii => dataset
            .read_raw::<VarLenAscii>()
            .map_err(|e| Error::read(name, e))?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::FixedAscii(_) => dataset
            .read_raw::<FixedAscii<FIXED_STRING_WIDTH>>()
            .map_err(|e| Error::read(name, e))?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        TypeDescriptor::FixedUnicode(_) => dataset
            .read_raw::<FixedUnicode<FIXED_STRING_WIDTH>>()
            .map_err(|e| Error::read(name, e))?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        other => {
            return Err(Error::read(name, format!("expected strings, found {other:?}")));
        }
    };
    Ok(values
        .into_iter()
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .collect())
}

/// Writes an extract file: one dataset per `(name, array)` pair.
///
/// # Errors
/// Returns an error if the file or any dataset cannot be created.
pub fn write_subset<P: AsRef<Path>>(path: P, datasets: &[(String, ArrayD<f64>)]) -> Result<()> {
    let file = File::create(path)?;
    for (name, data) in datasets {
        let dataset = file
            .new_dataset::<f64>()
            .shape(data.shape().to_vec())
            .create(name.as_str())?;
        dataset.write(data.view())?;
        log::debug!("wrote {name} {:?}", data.shape());
    }
    file.flush()?;
    Ok(())
}
