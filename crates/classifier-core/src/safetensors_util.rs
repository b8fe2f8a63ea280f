use anyhow::{bail, Context, Result};
use memmap2::MmapOptions;
use safetensors::SafeTensors;
use std::fs::File;
use std::path::Path;
use tch::{nn, Kind, Tensor};

/// What happened to each tensor while copying a safetensors file into a var store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Variables overwritten from the file.
    pub loaded: Vec<String>,
    /// Variables with no tensor in the file.
    pub missing: Vec<String>,
    /// Tensors in the file with no matching variable.
    pub unexpected: Vec<String>,
    /// Variables whose shape differs from the file's tensor.
    pub mismatched: Vec<String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.mismatched.is_empty()
    }
}

fn kind_of(dtype: safetensors::Dtype) -> Result<Kind> {
    Ok(match dtype {
        safetensors::Dtype::F32 => Kind::Float,
        safetensors::Dtype::F64 => Kind::Double,
        safetensors::Dtype::F16 => Kind::Half,
        safetensors::Dtype::BF16 => Kind::BFloat16,
        safetensors::Dtype::I64 => Kind::Int64,
        other => bail!("Unsupported dtype: {:?}", other),
    })
}

/// Copies tensors from `path` into the variables of `vs` by name.
///
/// With `strict`, any missing, unexpected or mis-shaped tensor is an error and
/// nothing is partially accepted. Otherwise those tensors are skipped and
/// reported, which is how pretrained encoder weights are grafted onto a model
/// with a different head.
pub fn load_safetensors<P: AsRef<Path>>(vs: &mut nn::VarStore, path: P, strict: bool) -> Result<LoadReport> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let buffer = unsafe { MmapOptions::new().map(&file)? };
    let tensors = SafeTensors::deserialize(&buffer)
        .with_context(|| format!("Failed to parse safetensors header of {:?}", path))?;

    let mut variables = vs.variables();
    let device = vs.device();
    let mut report = LoadReport::default();
    let mut pending = Vec::new();

    for (name, view) in tensors.tensors() {
        let Some(var) = variables.remove(&name) else {
            report.unexpected.push(name);
            continue;
        };

        let shape: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();
        if var.size() != shape {
            report.mismatched.push(name);
            continue;
        }

        let kind = kind_of(view.dtype())?;
        let value = Tensor::from_data_size(view.data(), &shape, kind)
            .to_kind(var.kind())
            .to_device(device);
        pending.push((name, var, value));
    }
    report.missing = variables.into_keys().collect();
    report.missing.sort();
    report.unexpected.sort();
    report.mismatched.sort();

    if strict && !report.is_complete() {
        bail!(
            "{:?} does not match the model: missing {:?}, unexpected {:?}, mismatched {:?}",
            path,
            report.missing,
            report.unexpected,
            report.mismatched
        );
    }

    for (name, mut var, value) in pending {
        tch::no_grad(|| var.f_copy_(&value))
            .with_context(|| format!("Failed to copy tensor {}", name))?;
        log::debug!("Loaded tensor: {}", name);
        report.loaded.push(name);
    }
    report.loaded.sort();

    for name in report.missing.iter().chain(&report.mismatched) {
        log::warn!("Tensor {} kept its initial value", name);
    }
    for name in &report.unexpected {
        log::warn!("Tensor {} found in safetensors but not in model", name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;
    use tempfile::TempDir;

    fn store_with(shape: &[i64]) -> nn::VarStore {
        let vs = nn::VarStore::new(Device::Cpu);
        let _ = vs.root().var("w", shape, nn::Init::Const(1.0));
        vs
    }

    #[test]
    fn strict_load_copies_matching_variables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.safetensors");
        let source = nn::VarStore::new(Device::Cpu);
        let _ = source.root().var("w", &[2, 3], nn::Init::Const(4.0));
        source.save(&path).unwrap();

        let mut target = store_with(&[2, 3]);
        let report = load_safetensors(&mut target, &path, true).unwrap();

        assert_eq!(report.loaded, vec!["w".to_string()]);
        let variables = target.variables();
        assert_eq!(variables["w"].double_value(&[1, 2]), 4.0);
    }

    #[test]
    fn strict_load_rejects_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.safetensors");
        store_with(&[4]).save(&path).unwrap();

        let mut target = store_with(&[2, 3]);
        assert!(load_safetensors(&mut target, &path, true).is_err());
    }

    #[test]
    fn lenient_load_reports_and_skips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.safetensors");
        store_with(&[4]).save(&path).unwrap();

        let mut target = store_with(&[2, 3]);
        let _ = target.root().var("extra", &[1], nn::Init::Const(0.0));
        let report = load_safetensors(&mut target, &path, false).unwrap();

        assert!(report.loaded.is_empty());
        assert_eq!(report.mismatched, vec!["w".to_string()]);
        assert_eq!(report.missing, vec!["extra".to_string()]);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.safetensors");
        std::fs::write(&path, b"not a safetensors file").unwrap();

        let mut target = store_with(&[2]);
        assert!(load_safetensors(&mut target, &path, false).is_err());
    }
}
