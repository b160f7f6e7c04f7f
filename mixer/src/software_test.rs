#![allow(clippy::float_cmp)]

use super::*;

fn dc_clip(frames: usize, level: f32) -> ClipHandle {
    ClipHandle::from_samples("dc", 1000, 1, vec![level; frames])
}

fn ramp_clip(frames: usize) -> ClipHandle {
    #[allow(clippy::cast_precision_loss)]
    let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
    ClipHandle::from_samples("ramp", 1000, 1, samples)
}

// =============================================================
// Device and state
// =============================================================

#[test]
fn device_opens_running_context() {
    let ctx = SoftwareDevice::new(1000).open().unwrap();
    assert_eq!(ctx.state(), ContextState::Running);
    assert_eq!(ctx.current_time(), 0.0);
    assert_eq!(ctx.sample_rate(), 1000);
}

#[test]
fn suspended_device_opens_suspended_context() {
    let mut ctx = SoftwareDevice::suspended(1000).open().unwrap();
    assert_eq!(ctx.state(), ContextState::Suspended);
    ctx.resume().unwrap();
    assert_eq!(ctx.state(), ContextState::Running);
}

#[test]
fn zero_rate_device_is_unavailable() {
    let err = SoftwareDevice::new(0).open().unwrap_err();
    assert!(matches!(err, MixError::DeviceUnavailable(_)));
}

#[test]
fn suspended_context_renders_silence_and_freezes_clock() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(100, 1.0), true).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    ctx.suspend();
    let mut out = vec![1.0f32; 20];
    ctx.render(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));
    assert_eq!(ctx.current_time(), 0.0);
}

#[test]
fn closed_context_refuses_chains_and_resume() {
    let mut ctx = SoftwareContext::new(1000);
    ctx.create_chain(&dc_clip(10, 1.0), false).unwrap();
    ctx.close();
    assert_eq!(ctx.chain_count(), 0);
    assert_eq!(ctx.create_chain(&dc_clip(10, 1.0), false).unwrap_err(), MixError::ContextClosed);
    assert_eq!(ctx.resume().unwrap_err(), MixError::ContextClosed);
}

// =============================================================
// Chains
// =============================================================

#[test]
fn new_chain_starts_silent() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(100, 1.0), false).unwrap();
    assert_eq!(ctx.chain_gain(chain), Some(0.0));
    let mut out = vec![0.0f32; 20];
    ctx.render(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn unsupported_clips_are_rejected() {
    let mut ctx = SoftwareContext::new(1000);
    let empty = ClipHandle::from_samples("empty", 1000, 1, Vec::new());
    let surround = ClipHandle::from_samples("6ch", 1000, 6, vec![0.0; 60]);
    let no_rate = ClipHandle::from_samples("norate", 0, 1, vec![0.0; 10]);
    for clip in [empty, surround, no_rate] {
        assert!(matches!(ctx.create_chain(&clip, false), Err(MixError::UnsupportedClip { .. })));
    }
    assert_eq!(ctx.chain_count(), 0);
}

#[test]
fn release_removes_chain() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(10, 1.0), false).unwrap();
    ctx.release_chain(chain);
    assert_eq!(ctx.chain_count(), 0);
    assert!(ctx.is_ended(chain));
}

#[test]
fn set_pan_clamps_and_set_loop_applies() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(10, 1.0), false).unwrap();
    ctx.set_pan(chain, 5.0);
    ctx.set_loop(chain, true);
    assert_eq!(ctx.chain_pan(chain), Some(1.0));
    assert_eq!(ctx.chain_looping(chain), Some(true));
}

// =============================================================
// Rendering
// =============================================================

#[test]
fn render_advances_clock() {
    let mut ctx = SoftwareContext::new(1000);
    let mut out = vec![0.0f32; 500 * 2];
    ctx.render(&mut out);
    assert!((ctx.current_time() - 0.5).abs() < 1e-12);
}

#[test]
fn centered_mono_uses_equal_power() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(100, 1.0), false).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    let mut out = vec![0.0f32; 2];
    ctx.render(&mut out);
    let expected = std::f32::consts::FRAC_1_SQRT_2;
    assert!((out[0] - expected).abs() < 1e-5);
    assert!((out[1] - expected).abs() < 1e-5);
}

#[test]
fn hard_left_pan_silences_right() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(100, 0.5), false).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    ctx.set_pan(chain, -1.0);
    let mut out = vec![0.0f32; 2];
    ctx.render(&mut out);
    assert!((out[0] - 0.5).abs() < 1e-6);
    assert!(out[1].abs() < 1e-6);
}

#[test]
fn gain_ramp_shapes_output() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(1000, 1.0), false).unwrap();
    ctx.set_pan(chain, 1.0);
    ctx.schedule_gain(chain, GainRamp::linear(0.0, 1.0, 0.0, 0.1));
    let mut out = vec![0.0f32; 200 * 2];
    ctx.render(&mut out);
    // Right channel of frame 50 (t = 0.05 s) is halfway up the ramp.
    assert!((out[50 * 2 + 1] - 0.5).abs() < 1e-3);
    assert!((out[150 * 2 + 1] - 1.0).abs() < 1e-6);
    assert!(out[0].abs() < 1e-6);
}

#[test]
fn non_looping_source_ends() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&dc_clip(10, 1.0), false).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    let mut out = vec![0.0f32; 20 * 2];
    ctx.render(&mut out);
    assert!(ctx.is_ended(chain));
    assert!(out[5 * 2].abs() > 0.0);
    assert_eq!(out[15 * 2], 0.0);
}

#[test]
fn looping_source_wraps() {
    let mut ctx = SoftwareContext::new(1000);
    let chain = ctx.create_chain(&ramp_clip(10), true).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    ctx.set_pan(chain, -1.0);
    let mut out = vec![0.0f32; 25 * 2];
    ctx.render(&mut out);
    assert!(!ctx.is_ended(chain));
    // Frame 12 reads source frame 2 again.
    assert!((out[12 * 2] - out[2 * 2]).abs() < 1e-6);
}

#[test]
fn resamples_slower_clip() {
    let mut ctx = SoftwareContext::new(2000);
    let chain = ctx.create_chain(&ramp_clip(10), false).unwrap();
    ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
    ctx.set_pan(chain, -1.0);
    let mut out = vec![0.0f32; 4 * 2];
    ctx.render(&mut out);
    // Half-step reads interpolate between source frames 0 and 1.
    assert!((out[2] - 0.05).abs() < 1e-6);
    assert!((out[4] - 0.1).abs() < 1e-6);
}

#[test]
fn output_is_clamped() {
    let mut ctx = SoftwareContext::new(1000);
    for _ in 0..3 {
        let chain = ctx.create_chain(&dc_clip(10, 1.0), false).unwrap();
        ctx.schedule_gain(chain, GainRamp::hold(1.0, 0.0));
        ctx.set_pan(chain, -1.0);
    }
    let mut out = vec![0.0f32; 2];
    ctx.render(&mut out);
    assert_eq!(out[0], 1.0);
}

#[test]
fn advance_discards_audio_but_moves_clock() {
    let mut ctx = SoftwareContext::new(1000);
    ctx.advance(0.25);
    assert!((ctx.current_time() - 0.25).abs() < 1e-12);
    ctx.advance(-1.0);
    assert!((ctx.current_time() - 0.25).abs() < 1e-12);
}
