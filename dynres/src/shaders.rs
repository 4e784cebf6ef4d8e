//! Holds the sources for all shaders.

use std::borrow::Cow;

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders"]
pub(crate) struct DynresShaderSources;

/// Fetches an embedded wgsl source by file name. The embed is validated by
/// tests, so a missing or non-utf8 file is a packaging bug, not a runtime
/// condition.
pub(crate) fn wgsl_source(name: &str) -> Cow<'static, str> {
    let file = DynresShaderSources::get(name).unwrap_or_else(|| panic!("missing embedded shader {name}"));
    match file.data {
        Cow::Borrowed(bytes) => Cow::Borrowed(std::str::from_utf8(bytes).expect("embedded shader is not utf8")),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8(bytes).expect("embedded shader is not utf8")),
    }
}

#[cfg(test)]
mod tests {
    use codespan_reporting::{
        diagnostic::{Diagnostic, Label},
        files::SimpleFile,
        term::{
            self,
            termcolor::{ColorChoice, StandardStream},
        },
    };

    use glam::Vec2;

    use super::{wgsl_source, DynresShaderSources};

    fn emit_validation_error(name: &str, source: &str, error: &naga::WithSpan<naga::valid::ValidationError>) {
        let file = SimpleFile::new(name, source);
        let labels = error
            .spans()
            .filter_map(|(span, desc)| {
                span.to_range()
                    .map(|range| Label::primary((), range).with_message(desc.clone()))
            })
            .collect();
        let diagnostic = Diagnostic::error()
            .with_message(error.as_inner().to_string())
            .with_labels(labels);

        let writer = StandardStream::stderr(ColorChoice::Auto);
        term::emit(&mut writer.lock(), &term::Config::default(), &file, &diagnostic).unwrap();
    }

    #[test]
    fn embedded_shaders_parse_and_validate() {
        let mut validated = 0;
        for name in DynresShaderSources::iter() {
            let source = wgsl_source(&name);

            let module = match naga::front::wgsl::parse_str(&source) {
                Ok(module) => module,
                Err(error) => {
                    error.emit_to_stderr_with_path(&source, &name);
                    panic!("failed to parse {name}");
                }
            };

            let mut validator =
                naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
            if let Err(error) = validator.validate(&module) {
                emit_validation_error(&name, &source, &error);
                panic!("failed to validate {name}");
            }

            validated += 1;
        }
        assert_eq!(validated, 4);
    }

    #[test]
    fn depth_composite_texel_stays_inside_the_written_rect() {
        // Mirrors the load coordinate in composite-depth.frag.wgsl: the depth
        // texel derives from the normalized uv and the depth texture's own
        // size. A window-sized coordinate would run past the internal-sized
        // texture whenever the fixed factor is below one.
        let window = Vec2::new(1920.0, 1080.0);
        let depth_dims = Vec2::new(960.0, 540.0); // fixed resolution factor 0.5

        for (frag, factor) in [
            (Vec2::new(1900.5, 1000.5), 1.0_f32),
            (Vec2::new(1919.5, 1079.5), 1.0),
            (Vec2::new(1919.5, 1079.5), 0.15),
            (Vec2::new(0.5, 0.5), 0.5),
        ] {
            let uv = frag / window * factor;
            let texel = (uv * depth_dims).floor();
            assert!(texel.cmpge(Vec2::ZERO).all(), "{frag} at factor {factor}");
            // Loads must land in the sub-rectangle the scene pass wrote.
            assert!(
                texel.cmplt((depth_dims * factor).ceil()).all(),
                "{frag} at factor {factor} gave texel {texel}"
            );
        }
    }
}
