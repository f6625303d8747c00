//! Tesseract backend through `leptess`
//!
//! The frame goes to the engine as PNG bytes and the word table comes back as
//! TSV. A recognition call cannot be interrupted once it starts, so the
//! cancel flag is checked before handing the frame over and again before the
//! result is used.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use super::{DetectionBox, OcrToken};

#[cfg(feature = "tesseract")]
pub use engine::TesseractOcr;

/// Tesseract engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub struct TesseractConfig {
    /// Directory holding `*.traineddata`; the engine default when unset
    pub data_path: Option<PathBuf>,
    /// Tesseract language code (e.g. "eng")
    pub language: String,
    /// Page segmentation mode, engine default when unset
    pub page_seg_mode: Option<u8>,
    /// DPI reported to the engine for captured frames
    pub source_resolution: i32,
    /// Apply Otsu binarization before recognition
    pub binarize: bool,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            language: "eng".to_string(),
            page_seg_mode: None,
            source_resolution: 96,
            binarize: true,
        }
    }
}

#[cfg(feature = "tesseract")]
mod engine {
    use image::{GrayImage, ImageFormat};
    use leptess::{LepTess, Variable};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::time::Instant;
    use tracing::{debug, info};

    use super::{parse_tsv, TesseractConfig};
    use crate::error::{Result, SentryError};
    use crate::shared::CancelToken;
    use crate::vision::ocr_preprocess::binarize_otsu;
    use crate::vision::{OcrToken, TextRecognizer};

    thread_local! {
        // Engine handles stay on the thread that created them
        static ENGINE: RefCell<Option<(TesseractConfig, LepTess)>> = const { RefCell::new(None) };
    }

    fn init_engine(config: &TesseractConfig) -> Result<LepTess> {
        let data_path = config
            .data_path
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        let mut engine = LepTess::new(data_path.as_deref(), &config.language).map_err(|e| {
            SentryError::Ocr(format!(
                "failed to initialize tesseract for {:?}: {:?}",
                config.language, e
            ))
        })?;
        if let Some(psm) = config.page_seg_mode {
            engine
                .set_variable(Variable::TesseditPagesegMode, &psm.to_string())
                .map_err(|e| SentryError::Ocr(format!("failed to set page segmentation mode: {:?}", e)))?;
        }
        Ok(engine)
    }

    fn run_engine(engine: &mut LepTess, png: &[u8], resolution: i32) -> Result<String> {
        engine
            .set_image_from_mem(png)
            .map_err(|e| SentryError::Ocr(format!("failed to load frame into tesseract: {:?}", e)))?;
        engine.set_source_resolution(resolution);
        engine
            .get_tsv_text(0)
            .map_err(|e| SentryError::Ocr(format!("tesseract returned invalid text: {}", e)))
    }

    fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| SentryError::Ocr(format!("failed to encode frame: {}", e)))?;
        Ok(png)
    }

    /// OCR engine backed by libtesseract
    pub struct TesseractOcr {
        config: TesseractConfig,
    }

    impl TesseractOcr {
        /// Check that the engine starts with `config`, so a missing language
        /// pack fails at startup instead of on every cycle
        pub fn new(config: TesseractConfig) -> Result<Self> {
            init_engine(&config)?;
            info!(
                "Using tesseract OCR backend (lang={}, data={:?})",
                config.language, config.data_path
            );
            Ok(Self { config })
        }

        fn cancelled() -> SentryError {
            SentryError::Ocr("recognition cancelled".into())
        }
    }

    impl TextRecognizer for TesseractOcr {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(&mut self, frame: &GrayImage, cancel: &CancelToken) -> Result<Vec<OcrToken>> {
            if frame.width() == 0 || frame.height() == 0 {
                return Ok(vec![]);
            }
            if cancel.is_cancelled() {
                return Err(Self::cancelled());
            }

            let start = Instant::now();
            let input = if self.config.binarize {
                binarize_otsu(frame)
            } else {
                frame.clone()
            };
            let png = encode_png(&input)?;

            let tsv = ENGINE.with(|slot| -> Result<String> {
                let mut slot = slot.borrow_mut();
                let mut engine = match slot.take() {
                    Some((config, engine)) if config == self.config => engine,
                    _ => init_engine(&self.config)?,
                };
                let result = run_engine(&mut engine, &png, self.config.source_resolution);
                *slot = Some((self.config.clone(), engine));
                result
            })?;

            if cancel.is_cancelled() {
                return Err(Self::cancelled());
            }

            let tokens = parse_tsv(&tsv);
            debug!(
                "Tesseract: {} tokens from {}x{} frame in {:?}",
                tokens.len(),
                frame.width(),
                frame.height(),
                start.elapsed()
            );
            Ok(tokens)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_empty_frame_skips_engine() {
            let mut ocr = TesseractOcr {
                config: TesseractConfig::default(),
            };
            let tokens = ocr.recognize(&GrayImage::new(0, 0), &CancelToken::new()).unwrap();
            assert!(tokens.is_empty());
        }

        #[test]
        fn test_cancelled_before_recognition() {
            let mut ocr = TesseractOcr {
                config: TesseractConfig::default(),
            };
            let cancel = CancelToken::new();
            cancel.cancel();
            let err = ocr.recognize(&GrayImage::new(8, 8), &cancel).unwrap_err();
            assert!(matches!(err, SentryError::Ocr(_)));
            assert!(err.is_recoverable());
        }

        #[test]
        fn test_missing_language_fails_at_startup() {
            let result = TesseractOcr::new(TesseractConfig {
                language: "no-such-language".to_string(),
                ..Default::default()
            });
            assert!(matches!(result, Err(SentryError::Ocr(_))));
        }
    }
}

/// Parse tesseract TSV output into tokens, preserving row order.
///
/// Columns: level, page, block, paragraph, line, word, left, top, width,
/// height, conf, text. Layout rows (page/block/line) carry `conf = -1` and no
/// text; they are kept and left for the matcher's confidence filter.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub fn parse_tsv(output: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();

    for (line_no, line) in output.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with("level\t") {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            debug!("Skipping short TSV row {}", line_no);
            continue;
        }

        let parsed = (
            fields[6].parse::<u32>(),
            fields[7].parse::<u32>(),
            fields[8].parse::<u32>(),
            fields[9].parse::<u32>(),
            fields[10].trim().parse::<f32>(),
        );
        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(conf)) = parsed else {
            debug!("Skipping malformed TSV row {}", line_no);
            continue;
        };

        let text = fields.get(11).copied().unwrap_or("");
        tokens.push(OcrToken::new(
            text,
            conf as i32,
            DetectionBox::new(left, top, width, height),
        ));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
4\t1\t1\t1\t1\t0\t36\t92\t310\t18\t-1\t\n\
5\t1\t1\t1\t1\t1\t36\t92\t88\t18\t96.063751\tCall\n\
5\t1\t1\t1\t1\t2\t130\t92\t120\t18\t91.5\t555-123-4567\n\
5\t1\t1\t1\t1\t3\t256\t92\t90\t18\t0.4\tpassword\n";

    #[test]
    fn test_parse_tsv_rows() {
        let tokens = parse_tsv(SAMPLE);
        assert_eq!(tokens.len(), 5);

        assert_eq!(tokens[0].text, "");
        assert_eq!(tokens[0].confidence, -1);

        assert_eq!(tokens[2].text, "Call");
        assert_eq!(tokens[2].confidence, 96);
        assert_eq!(tokens[2].bounds, DetectionBox::new(36, 92, 88, 18));

        assert_eq!(tokens[3].text, "555-123-4567");
        assert_eq!(tokens[3].bounds.x, 130);
    }

    #[test]
    fn test_fractional_confidence_truncates() {
        let tokens = parse_tsv(SAMPLE);
        // 0.4 truncates to 0, which the matcher treats as noise
        assert_eq!(tokens[4].confidence, 0);
    }

    #[test]
    fn test_parse_tsv_skips_malformed_rows() {
        let output = "level\tpage_num\n5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword\n5\t1\t1\n";
        assert!(parse_tsv(output).is_empty());
    }

    #[test]
    fn test_parse_tsv_handles_crlf_and_missing_text() {
        let output = "5\t1\t1\t1\t1\t1\t10\t20\t30\t40\t88\r\n";
        let tokens = parse_tsv(output);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "");
        assert_eq!(tokens[0].confidence, 88);
    }
}
