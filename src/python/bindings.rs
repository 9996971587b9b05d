//! Python bindings for the Mistral tokenizers.
//!
//! # Thread Safety
//!
//! Tokenizers are immutable after construction and can be shared across
//! Python threads. Batch operations release the GIL and use Rayon.
//!
//! # Example
//!
//! ```python
//! from mistral_tokenizer import Tokenizer
//!
//! tokenizer = Tokenizer.for_model("mistral-nemo", "data")
//! tokens = tokenizer.encode("Hello, world!")
//! text = tokenizer.decode(tokens)
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::core::{DataDir, MistralTokenizer, Tokenizer, TokenizerError, TokenizerVersion};

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::IoError(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python wrapper for [`MistralTokenizer`].
#[pyclass(name = "Tokenizer", frozen)]
pub struct PyTokenizer {
    inner: MistralTokenizer,
}

#[pymethods]
impl PyTokenizer {
    /// Load a tokenizer from a data directory.
    ///
    /// Args:
    ///     data_dir: Directory holding `bpe/<version>/` and `tekken/`
    ///     version: "v1", "v2" or "v3"
    ///     use_tekken: Load the Tekken vocabulary (v3 only)
    ///     multimodal: Require image parameters in the Tekken document
    ///
    /// Raises:
    ///     ValueError: If the version or configuration is invalid
    ///     IOError: If an asset file cannot be read
    #[staticmethod]
    #[pyo3(signature = (data_dir, version, use_tekken=false, multimodal=false))]
    fn from_data_dir(
        data_dir: &str,
        version: &str,
        use_tekken: bool,
        multimodal: bool,
    ) -> PyResult<Self> {
        let version: TokenizerVersion = version.parse().map_err(to_py_err)?;
        let assets = DataDir::new(data_dir);
        let inner =
            MistralTokenizer::new(version, use_tekken, multimodal, &assets).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Load the tokenizer a model was trained with.
    ///
    /// Args:
    ///     model: Model name, e.g. "open-mistral-7b" or "mistral-nemo"
    ///     data_dir: Directory holding the tokenizer assets
    #[staticmethod]
    fn for_model(model: &str, data_dir: &str) -> PyResult<Self> {
        let assets = DataDir::new(data_dir);
        let inner = MistralTokenizer::for_model_name(model, &assets).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Encode text to token IDs.
    ///
    /// Args:
    ///     text: Input text
    ///     add_bos: Prepend the BOS token (default: True)
    ///     add_eos: Append the EOS token (default: False)
    #[pyo3(signature = (text, add_bos=true, add_eos=false))]
    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<u32> {
        self.inner.encode(text, add_bos, add_eos)
    }

    /// Decode token IDs to a string. A leading BOS is skipped.
    ///
    /// Raises:
    ///     ValueError: If the IDs contain control tokens (Tekken) or
    ///         IDs outside the vocabulary (SentencePiece)
    fn decode(&self, tokens: Vec<u32>) -> PyResult<String> {
        self.inner.decode(&tokens).map_err(to_py_err)
    }

    /// Batch encode multiple texts in parallel.
    #[pyo3(signature = (texts, add_bos=true, add_eos=false))]
    fn encode_batch(
        &self,
        py: Python<'_>,
        texts: Vec<String>,
        add_bos: bool,
        add_eos: bool,
    ) -> Vec<Vec<u32>> {
        py.allow_threads(|| self.inner.encode_batch(&texts, add_bos, add_eos))
    }

    /// Batch decode multiple token lists in parallel.
    fn decode_batch(&self, py: Python<'_>, token_lists: Vec<Vec<u32>>) -> PyResult<Vec<String>> {
        py.allow_threads(|| self.inner.decode_batch(&token_lists))
            .map_err(to_py_err)
    }

    /// Vocabulary size, including control tokens.
    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    /// Every token as a string, indexed by ID.
    #[getter]
    fn vocab(&self) -> Vec<String> {
        self.inner.vocab().to_vec()
    }

    #[getter]
    fn bos_id(&self) -> u32 {
        self.inner.bos_id()
    }

    #[getter]
    fn eos_id(&self) -> u32 {
        self.inner.eos_id()
    }

    #[getter]
    fn version(&self) -> &'static str {
        self.inner.version().as_str()
    }

    #[getter]
    fn is_tekken(&self) -> bool {
        self.inner.is_tekken()
    }

    fn __repr__(&self) -> String {
        format!(
            "Tokenizer(version={}, tekken={}, vocab_size={})",
            self.inner.version(),
            self.inner.is_tekken(),
            self.inner.vocab_size()
        )
    }
}
