//! Safe wrappers around FFmpeg FFI calls.
//!
//! All `unsafe` blocks the renderer needs are contained here with explicit
//! safety arguments.

use std::ffi::CString;

use ffmpeg_next as ffmpeg;

/// Allocate a fresh `AVCodecParameters`, copy the encoder context into it,
/// and return it as a safe `ffmpeg::codec::Parameters`.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_from_context` copies fields from a live,
    // open encoder context into freshly allocated parameters that the
    // returned wrapper owns.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

/// Zero out `codec_tag` on an output stream so the muxer picks its own.
///
/// Must be called after `set_parameters` and before `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `codecpar` is set by `set_parameters` and is non-null;
    // `codec_tag` is a plain u32 field.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

/// Parse `description` into `graph`, wiring every named source filter to the
/// description's input label of the same name and its single output label to
/// `sink`.
///
/// `Graph::output` in ffmpeg-next only keeps two open endpoints, so graphs
/// with more inputs build the `AVFilterInOut` lists here.
pub fn parse_filter_graph(
    graph: &mut ffmpeg::filter::Graph,
    sources: &[&str],
    sink: &str,
    description: &str,
) -> Result<(), ffmpeg::Error> {
    let spec = CString::new(description).map_err(|_| ffmpeg::Error::InvalidData)?;

    let mut outputs: *mut ffmpeg::ffi::AVFilterInOut = std::ptr::null_mut();
    for name in sources.iter().rev() {
        match alloc_inout(graph, name, outputs) {
            Ok(node) => outputs = node,
            Err(e) => {
                free_inouts(&mut outputs);
                return Err(e);
            }
        }
    }

    let mut inputs = match alloc_inout(graph, sink, std::ptr::null_mut()) {
        Ok(node) => node,
        Err(e) => {
            free_inouts(&mut outputs);
            return Err(e);
        }
    };

    // SAFETY: the graph pointer is valid for the lifetime of `graph`; both
    // lists were built by `alloc_inout` and are consumed or left for
    // `free_inouts` by `avfilter_graph_parse_ptr`.
    let ret = unsafe {
        ffmpeg::ffi::avfilter_graph_parse_ptr(
            graph.as_mut_ptr(),
            spec.as_ptr(),
            &mut inputs,
            &mut outputs,
            std::ptr::null_mut(),
        )
    };

    free_inouts(&mut inputs);
    free_inouts(&mut outputs);

    if ret < 0 {
        return Err(ffmpeg::Error::from(ret));
    }
    Ok(())
}

fn alloc_inout(
    graph: &mut ffmpeg::filter::Graph,
    name: &str,
    next: *mut ffmpeg::ffi::AVFilterInOut,
) -> Result<*mut ffmpeg::ffi::AVFilterInOut, ffmpeg::Error> {
    let c_name = CString::new(name).map_err(|_| ffmpeg::Error::InvalidData)?;
    let mut context = graph.get(name).ok_or(ffmpeg::Error::FilterNotFound)?;

    // SAFETY: the node is checked for null before use; `av_strdup` copies the
    // name so the CString may be dropped; the filter context pointer stays
    // valid as long as the graph lives.
    unsafe {
        let node = ffmpeg::ffi::avfilter_inout_alloc();
        if node.is_null() {
            return Err(ffmpeg::Error::Unknown);
        }
        (*node).name = ffmpeg::ffi::av_strdup(c_name.as_ptr());
        (*node).filter_ctx = context.as_mut_ptr();
        (*node).pad_idx = 0;
        (*node).next = next;
        Ok(node)
    }
}

fn free_inouts(list: &mut *mut ffmpeg::ffi::AVFilterInOut) {
    // SAFETY: `avfilter_inout_free` accepts null and nulls the pointer.
    unsafe { ffmpeg::ffi::avfilter_inout_free(list) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_endpoints(sources: &[&str]) -> ffmpeg::filter::Graph {
        crate::ffmpeg_utils::init().unwrap();
        let mut graph = ffmpeg::filter::Graph::new();
        let abuffer = ffmpeg::filter::find("abuffer").unwrap();
        let sink = ffmpeg::filter::find("abuffersink").unwrap();
        for name in sources {
            graph
                .add(
                    &abuffer,
                    name,
                    "time_base=1/44100:sample_rate=44100:sample_fmt=fltp:channel_layout=0x3",
                )
                .unwrap();
        }
        graph.add(&sink, "out", "").unwrap();
        graph
    }

    #[test]
    fn test_parse_three_inputs() {
        let mut graph = graph_with_endpoints(&["main", "bg0", "bg1"]);
        parse_filter_graph(
            &mut graph,
            &["main", "bg0", "bg1"],
            "out",
            "[main][bg0][bg1]amix=inputs=3:normalize=0[out]",
        )
        .unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_parse_unknown_source() {
        let mut graph = graph_with_endpoints(&["main"]);
        let result = parse_filter_graph(&mut graph, &["missing"], "out", "[missing]anull[out]");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_description() {
        let mut graph = graph_with_endpoints(&["main"]);
        let result = parse_filter_graph(&mut graph, &["main"], "out", "[main]no_such_filter[out]");
        assert!(result.is_err());
    }
}
