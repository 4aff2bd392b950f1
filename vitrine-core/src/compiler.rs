use crate::descriptor::{PassKind, ShaderDescriptor};
use crate::shader_preprocessor::ShaderPreprocessor;
use naga::front::glsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use thiserror::Error;

/// Shader compilation failure, always tagged with the entry and pass it came from.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Shader compilation failed for '{key}' ({pass} pass):\n{message}")]
pub struct CompileError {
    pub key: String,
    pub pass: String,
    pub message: String,
}

/// A validated fragment shader module ready to hand to the GPU backend.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub pass: String,
    pub module: naga::Module,
    pub source: String,
}

pub struct ShaderCompiler<'a> {
    descriptor: &'a ShaderDescriptor,
    preprocessor: ShaderPreprocessor<'a>,
}

impl<'a> ShaderCompiler<'a> {
    pub fn new(descriptor: &'a ShaderDescriptor) -> Self {
        Self {
            descriptor,
            preprocessor: ShaderPreprocessor::new(descriptor),
        }
    }

    /// Wrap, parse and validate the source of one pass.
    pub fn compile(
        &self,
        pass: &str,
        kind: PassKind,
        pass_source: &str,
    ) -> Result<CompiledShader, CompileError> {
        let source = self.preprocessor.wrap(kind, pass_source);
        let error = |message: String| CompileError {
            key: self.descriptor.key.clone(),
            pass: pass.to_string(),
            message,
        };

        let mut frontend = glsl::Frontend::default();
        let options = glsl::Options::from(naga::ShaderStage::Fragment);
        let module = frontend
            .parse(&options, &source)
            .map_err(|e| error(e.emit_to_string(&source)))?;

        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| error(e.emit_to_string(&source)))?;

        log::debug!("Compiled '{}' ({} pass)", self.descriptor.key, pass);
        Ok(CompiledShader {
            pass: pass.to_string(),
            module,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ApiVersion, ParamSpec};

    const VALID: &str = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    vec3 col = 0.5 + 0.5 * cos(iTime + uv.xyx + vec3(0.0, 2.0, 4.0));
    fragColor = vec4(col, 1.0);
}
"#;

    #[test]
    fn test_compiles_shadertoy_snippet() {
        let descriptor = ShaderDescriptor::new("gradient", VALID);
        let compiled = ShaderCompiler::new(&descriptor)
            .compile("image", PassKind::Image, VALID)
            .unwrap();
        assert_eq!(compiled.pass, "image");
        assert!(compiled
            .module
            .entry_points
            .iter()
            .any(|ep| ep.name == "main" && ep.stage == naga::ShaderStage::Fragment));
    }

    #[test]
    fn test_channels_and_params_are_usable() {
        let source = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    vec4 tex = texture(iChannel1, uv * ZOOM);
    fragColor = vec4(tex.rgb * iChannelResolution[1].x, 1.0);
}
"#;
        let mut descriptor = ShaderDescriptor::new("sampled", source);
        descriptor.params = vec![ParamSpec {
            name: "Zoom".to_string(),
            uniform: "ZOOM".to_string(),
            default: 1.0,
            min: 0.1,
            max: 8.0,
            step: 0.1,
        }];
        assert!(
            ShaderCompiler::new(&descriptor)
                .compile("image", PassKind::Image, source)
                .is_ok()
        );
    }

    #[test]
    fn test_webgl1_dialect() {
        let source = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = texture2D(iChannel0, fragCoord / iResolution.xy);
}
"#;
        let mut descriptor = ShaderDescriptor::new("legacy", source);
        descriptor.api = ApiVersion::WebGl1;
        assert!(
            ShaderCompiler::new(&descriptor)
                .compile("image", PassKind::Image, source)
                .is_ok()
        );
    }

    #[test]
    fn test_syntax_error_tagged_with_key() {
        let source = "void mainImage(out vec4 fragColor, in vec2 fragCoord) { fragColor = ; }";
        let descriptor = ShaderDescriptor::new("broken", source);
        let err = ShaderCompiler::new(&descriptor)
            .compile("image", PassKind::Image, source)
            .unwrap_err();
        assert_eq!(err.key, "broken");
        assert_eq!(err.pass, "image");
        assert!(!err.message.is_empty());
        assert!(err.to_string().contains("'broken'"));
    }

    #[test]
    fn test_undefined_identifier_rejected() {
        let source = "void mainImage(out vec4 fragColor, in vec2 fragCoord) { fragColor = vec4(notDefined); }";
        let descriptor = ShaderDescriptor::new("undefined", source);
        assert!(
            ShaderCompiler::new(&descriptor)
                .compile("image", PassKind::Image, source)
                .is_err()
        );
    }

    #[test]
    fn test_missing_main_image_rejected() {
        let source = "float helper() { return 1.0; }";
        let descriptor = ShaderDescriptor::new("no-entry", source);
        assert!(
            ShaderCompiler::new(&descriptor)
                .compile("image", PassKind::Image, source)
                .is_err()
        );
    }
}
