use crate::descriptor::{ApiVersion, PassKind, ShaderDescriptor};
use crate::render_constants::{bind_group, channel};
use std::fmt::Write;

const INPUTS_BLOCK: &str = "\
layout(set = 0, binding = 0) uniform VitrineInputs {
    vec4 iMouse;
    vec4 iDate;
    vec3 iResolution;
    float iTime;
    float iTimeDelta;
    int iFrame;
    float iFrameRate;
    float iSampleRate;
    vec3 iChannelResolution[4];
    vec4 iParams[4];
};
";

const WEBGL1_COMPAT: &str = "\
#define texture2D texture
#define texture2DLod textureLod
#define textureCube texture
";

const OUTPUT_DECL: &str = "layout(location = 0) out vec4 vitrine_frag_color;\n";

// Offscreen targets keep GL's row order: fragCoord.y == 0 is texture row 0,
// which is where uv.y == 0 samples.
const BUFFER_MAIN: &str = "\
void main() {
    vec4 color = vec4(0.0, 0.0, 0.0, 1.0);
    mainImage(color, gl_FragCoord.xy);
    vitrine_frag_color = color;
}
";

// The presented image has a top-left origin; flip to Shadertoy's bottom-left.
const IMAGE_MAIN: &str = "\
void main() {
    vec4 color = vec4(0.0, 0.0, 0.0, 1.0);
    mainImage(color, vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y));
    vitrine_frag_color = color;
}
";

pub const USER_CODE_MARKER: &str = "// === USER SHADER CODE ===";

/// Wraps Shadertoy-style snippets into complete GLSL 450 fragment shaders.
///
/// The snippet text is copied verbatim; everything the harness provides
/// (inputs, channels, parameters, `main`) lives in the generated header and
/// footer around it.
pub struct ShaderPreprocessor<'a> {
    descriptor: &'a ShaderDescriptor,
}

impl<'a> ShaderPreprocessor<'a> {
    pub fn new(descriptor: &'a ShaderDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn header(&self) -> String {
        let mut header = String::from("#version 450\n\n");
        header.push_str(INPUTS_BLOCK);
        header.push('\n');

        for slot in 0..channel::COUNT {
            // Writing into a String cannot fail.
            let _ = writeln!(
                header,
                "layout(set = {set}, binding = {tex}) uniform texture2D vitrine_channel{slot}_texture;\n\
                 layout(set = {set}, binding = {smp}) uniform sampler vitrine_channel{slot}_sampler;\n\
                 #define iChannel{slot} sampler2D(vitrine_channel{slot}_texture, vitrine_channel{slot}_sampler)",
                set = bind_group::CHANNELS,
                tex = channel::texture_binding(slot),
                smp = channel::sampler_binding(slot),
            );
        }

        if !self.descriptor.params.is_empty() {
            header.push('\n');
        }
        for (i, param) in self.descriptor.params.iter().enumerate() {
            let _ = writeln!(
                header,
                "#define {} iParams[{}].{}",
                param.uniform,
                i / 4,
                ["x", "y", "z", "w"][i % 4]
            );
        }

        if self.descriptor.api == ApiVersion::WebGl1 {
            header.push('\n');
            header.push_str(WEBGL1_COMPAT);
        }
        header
    }

    /// Complete fragment shader for one pass of the entry.
    pub fn wrap(&self, kind: PassKind, pass_source: &str) -> String {
        let mut final_content = self.header();
        if let Some(common) = &self.descriptor.common {
            final_content.push_str("\n// === COMMON CODE ===\n\n");
            final_content.push_str(&common.text);
            final_content.push('\n');
        }
        final_content.push('\n');
        final_content.push_str(USER_CODE_MARKER);
        final_content.push_str("\n\n");
        final_content.push_str(pass_source);
        final_content.push_str("\n\n");
        final_content.push_str(OUTPUT_DECL);
        final_content.push('\n');
        final_content.push_str(match kind {
            PassKind::Buffer => BUFFER_MAIN,
            PassKind::Image => IMAGE_MAIN,
        });
        final_content
    }
}
