// Shader module loading
//
// Vulkan consumes SPIR-V as 4-byte words. Bytes come from a ShaderLoader,
// get validated and realigned by ash::util::read_spv, and live in a
// ShaderModule only until the pipeline that uses them has been created.

use ash::vk;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use super::{LogicalDevice, RenderError, RenderResult};

/// Supplies compiled SPIR-V bytecode by path.
pub trait ShaderLoader {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads bytecode from the filesystem, relative paths resolved against `root`.
#[derive(Debug, Clone, Default)]
pub struct FsShaderLoader {
    root: Option<PathBuf>,
}

impl FsShaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ShaderLoader for FsShaderLoader {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }
}

/// Load `path` and decode it into SPIR-V words.
///
/// Fails with `ShaderLoadFailed` when the file can't be read, its length is
/// not a multiple of four, or the magic number is wrong.
pub fn load_spirv(loader: &impl ShaderLoader, path: &Path) -> RenderResult<Vec<u32>> {
    let shader_failed = |source| RenderError::ShaderLoadFailed {
        path: path.to_path_buf(),
        source,
    };

    let bytes = loader.load(path).map_err(shader_failed)?;
    let words = ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(shader_failed)?;

    log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Shader module that is destroyed when dropped.
pub struct ShaderModule<'a> {
    device: &'a ash::Device,
    pub handle: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    pub fn new(device: &'a LogicalDevice, code: &[u32]) -> RenderResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let handle = unsafe { device.raw.create_shader_module(&create_info, None) }
            .map_err(RenderError::pipeline("create shader module"))?;

        Ok(Self {
            device: &device.raw,
            handle,
        })
    }

    pub fn load(
        device: &'a LogicalDevice,
        loader: &impl ShaderLoader,
        path: &Path,
    ) -> RenderResult<Self> {
        let code = load_spirv(loader, path)?;
        Self::new(device, &code)
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    struct MemoryLoader(HashMap<PathBuf, Vec<u8>>);

    impl ShaderLoader for MemoryLoader {
        fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such shader"))
        }
    }

    fn loader(entries: &[(&str, Vec<u8>)]) -> MemoryLoader {
        MemoryLoader(
            entries
                .iter()
                .map(|(path, bytes)| (PathBuf::from(path), bytes.clone()))
                .collect(),
        )
    }

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_little_endian_words() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 5, 0];
        let loader = loader(&[("tri.vert.spv", words_to_bytes(&words))]);
        let code = load_spirv(&loader, Path::new("tri.vert.spv")).unwrap();
        assert_eq!(code, words);
    }

    #[test]
    fn rejects_bad_magic() {
        let loader = loader(&[("bad.spv", words_to_bytes(&[0xdead_beef, 0]))]);
        let err = load_spirv(&loader, Path::new("bad.spv")).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLoadFailed { ref path, .. } if path == Path::new("bad.spv")));
    }

    #[test]
    fn rejects_truncated_bytecode() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC, 0]);
        bytes.pop();
        let loader = loader(&[("short.spv", bytes)]);
        assert!(matches!(
            load_spirv(&loader, Path::new("short.spv")),
            Err(RenderError::ShaderLoadFailed { .. })
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = std::env::temp_dir().join(format!("vk-triangle-shader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let loader = FsShaderLoader::with_root(&dir);

        let err = load_spirv(&loader, Path::new("missing.frag.spv")).unwrap_err();
        match err {
            RenderError::ShaderLoadFailed { path, source } => {
                assert_eq!(path, Path::new("missing.frag.spv"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }

        std::fs::write(dir.join("ok.spv"), words_to_bytes(&[SPIRV_MAGIC, 1])).unwrap();
        assert_eq!(
            load_spirv(&loader, Path::new("ok.spv")).unwrap(),
            vec![SPIRV_MAGIC, 1]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
