// =============================================================================
// Hilbert Transform cycle indicators
// =============================================================================
//
// Ehlers' Hilbert-transform pipeline, bar by bar:
//
//   1. Smooth price with a 4-bar WMA (weights 4,3,2,1).
//   2. Detrender  = H(smooth),  Q1 = H(detrender),  I1 = detrender 3 bars ago,
//      where H(x) = (0.0962 x_t + 0.5769 x_{t-2} - 0.5769 x_{t-4}
//                    - 0.0962 x_{t-6}) * (0.075 * period_{t-1} + 0.54)
//   3. Advance the phases by 90 degrees (jI = H(I1), jQ = H(Q1)), form the
//      phasor (I2, Q2) and run the homodyne discriminator to measure the
//      period, limited to [6, 50] and to 0.67x..1.5x the previous reading.
//   4. The dominant-cycle phase is the angle of a one-cycle DFT of the
//      smoothed price; sine/lead-sine and the instantaneous trendline follow.
//
// The filter needs 12 bars of warm-up before its first update and a further
// settling period before the output is trustworthy, hence lookbacks of 32
// (period, phasor) and 63 (phase, sine, trendline, trend mode).

use serde::Serialize;
use tracing::debug;

use super::util::nan_vec;
use crate::error::{AnalysisError, Result};

const PERIOD_LOOKBACK: usize = 32;
const PHASE_LOOKBACK: usize = 63;
/// Bars consumed by the WMA seed and warm-up before the first filter step.
const WARMUP: usize = 12;

const HILBERT_A: f64 = 0.0962;
const HILBERT_B: f64 = 0.5769;

/// One Hilbert FIR filter with its own input history.
#[derive(Default)]
struct HilbertFilter {
    history: [f64; 7],
}

impl HilbertFilter {
    fn step(&mut self, x: f64, adjust: f64) -> f64 {
        self.history.rotate_right(1);
        self.history[0] = x;
        let h = &self.history;
        (HILBERT_A * h[0] + HILBERT_B * h[2] - HILBERT_B * h[4] - HILBERT_A * h[6]) * adjust
    }
}

/// Everything the pipeline knows about one bar.
#[derive(Debug, Clone, Copy, Default)]
struct HilbertBar {
    smooth_period: f64,
    dc_phase: f64,
    in_phase: f64,
    quadrature: f64,
    sine: f64,
    lead_sine: f64,
    trendline: f64,
    trend_mode: f64,
}

/// Run the full pipeline. Entries before `WARMUP` are left at their default.
fn run_pipeline(data: &[f64]) -> Vec<HilbertBar> {
    let n = data.len();
    let mut bars = vec![HilbertBar::default(); n];
    if n <= WARMUP {
        return bars;
    }

    let wma4 = |t: usize| (4.0 * data[t] + 3.0 * data[t - 1] + 2.0 * data[t - 2] + data[t - 3]) / 10.0;

    let mut detrender_f = HilbertFilter::default();
    let mut q1_f = HilbertFilter::default();
    let mut ji_f = HilbertFilter::default();
    let mut jq_f = HilbertFilter::default();
    let mut detrender_lag = [0.0f64; 4];

    let (mut prev_i2, mut prev_q2) = (0.0, 0.0);
    let (mut re, mut im) = (0.0, 0.0);
    let (mut period, mut smooth_period) = (0.0f64, 0.0f64);
    let mut dc_phase = 0.0f64;
    let (mut sine, mut lead_sine) = (0.0f64, 0.0f64);
    let mut i_trend = [0.0f64; 3];
    let mut days_in_trend = 0usize;
    let mut smooth_hist: Vec<f64> = Vec::with_capacity(n - WARMUP);

    for t in WARMUP..n {
        let adjust = 0.075 * period + 0.54;
        let smooth = wma4(t);
        smooth_hist.push(smooth);

        let detrender = detrender_f.step(smooth, adjust);
        let q1 = q1_f.step(detrender, adjust);
        detrender_lag.rotate_right(1);
        detrender_lag[0] = detrender;
        let i1 = detrender_lag[3];

        let ji = ji_f.step(i1, adjust);
        let jq = jq_f.step(q1, adjust);

        let q2 = 0.2 * (q1 + ji) + 0.8 * prev_q2;
        let i2 = 0.2 * (i1 - jq) + 0.8 * prev_i2;
        re = 0.2 * (i2 * prev_i2 + q2 * prev_q2) + 0.8 * re;
        im = 0.2 * (i2 * prev_q2 - q2 * prev_i2) + 0.8 * im;
        prev_q2 = q2;
        prev_i2 = i2;

        // --- Homodyne discriminator ----------------------------------------
        let prev_period = period;
        if im != 0.0 && re != 0.0 {
            period = 360.0 / (im / re).atan().to_degrees();
        }
        if period > 1.5 * prev_period {
            period = 1.5 * prev_period;
        }
        if period < 0.67 * prev_period {
            period = 0.67 * prev_period;
        }
        period = period.clamp(6.0, 50.0);
        period = 0.2 * period + 0.8 * prev_period;
        smooth_period = 0.33 * period + 0.67 * smooth_period;

        // --- Dominant cycle phase ------------------------------------------
        let prev_dc_phase = dc_phase;
        let dc_len = (smooth_period + 0.5) as usize;
        let (mut real_part, mut imag_part) = (0.0, 0.0);
        for i in 0..dc_len {
            let angle = i as f64 * std::f64::consts::TAU / dc_len as f64;
            let price = smooth_hist
                .len()
                .checked_sub(i + 1)
                .map_or(0.0, |k| smooth_hist[k]);
            real_part += angle.sin() * price;
            imag_part += angle.cos() * price;
        }
        if imag_part.abs() > 0.0 {
            dc_phase = (real_part / imag_part).atan().to_degrees();
        } else if real_part < 0.0 {
            dc_phase -= 90.0;
        } else if real_part > 0.0 {
            dc_phase += 90.0;
        }
        dc_phase += 90.0;
        // One bar of WMA lag.
        dc_phase += 360.0 / smooth_period;
        if imag_part < 0.0 {
            dc_phase += 180.0;
        }
        if dc_phase > 315.0 {
            dc_phase -= 360.0;
        }

        let prev_sine = sine;
        let prev_lead_sine = lead_sine;
        sine = dc_phase.to_radians().sin();
        lead_sine = (dc_phase + 45.0).to_radians().sin();

        // --- Instantaneous trendline ---------------------------------------
        let avg_len = dc_len.min(t + 1);
        let mut average: f64 = data[t + 1 - avg_len..=t].iter().sum();
        if avg_len > 0 {
            average /= avg_len as f64;
        }
        let trendline = (4.0 * average + 3.0 * i_trend[0] + 2.0 * i_trend[1] + i_trend[2]) / 10.0;
        i_trend = [average, i_trend[0], i_trend[1]];

        // --- Trend vs. cycle mode ------------------------------------------
        let mut trend = 1.0;
        let crossed_up = sine > lead_sine && prev_sine <= prev_lead_sine;
        let crossed_down = sine < lead_sine && prev_sine >= prev_lead_sine;
        if crossed_up || crossed_down {
            days_in_trend = 0;
            trend = 0.0;
        }
        days_in_trend += 1;
        if (days_in_trend as f64) < 0.5 * smooth_period {
            trend = 0.0;
        }
        let phase_step = dc_phase - prev_dc_phase;
        if smooth_period != 0.0
            && phase_step > 0.67 * 360.0 / smooth_period
            && phase_step < 1.5 * 360.0 / smooth_period
        {
            trend = 0.0;
        }
        if trendline != 0.0 && ((smooth - trendline) / trendline).abs() >= 0.015 {
            trend = 1.0;
        }

        bars[t] = HilbertBar {
            smooth_period,
            dc_phase,
            in_phase: i1,
            quadrature: q1,
            sine,
            lead_sine,
            trendline,
            trend_mode: trend,
        };
    }
    bars
}

fn checked_pipeline(data: &[f64], lookback: usize, name: &'static str) -> Result<Vec<HilbertBar>> {
    if data.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    if data.len() <= lookback {
        return Err(AnalysisError::InsufficientData {
            period: lookback + 1,
            len: data.len(),
        });
    }
    debug!(indicator = name, len = data.len(), "running Hilbert transform");
    Ok(run_pipeline(data))
}

fn project<F>(bars: &[HilbertBar], lookback: usize, f: F) -> Vec<f64>
where
    F: Fn(&HilbertBar) -> f64,
{
    let mut out = nan_vec(bars.len());
    for (slot, bar) in out.iter_mut().zip(bars).skip(lookback) {
        *slot = f(bar);
    }
    out
}

/// Hilbert Transform - Instantaneous Trendline.
pub fn ht_trendline(data: &[f64]) -> Result<Vec<f64>> {
    let bars = checked_pipeline(data, PHASE_LOOKBACK, "ht_trendline")?;
    Ok(project(&bars, PHASE_LOOKBACK, |b| b.trendline))
}

/// Hilbert Transform - Dominant Cycle Period.
pub fn ht_dcperiod(data: &[f64]) -> Result<Vec<f64>> {
    let bars = checked_pipeline(data, PERIOD_LOOKBACK, "ht_dcperiod")?;
    Ok(project(&bars, PERIOD_LOOKBACK, |b| b.smooth_period))
}

/// Hilbert Transform - Dominant Cycle Phase (degrees).
pub fn ht_dcphase(data: &[f64]) -> Result<Vec<f64>> {
    let bars = checked_pipeline(data, PHASE_LOOKBACK, "ht_dcphase")?;
    Ok(project(&bars, PHASE_LOOKBACK, |b| b.dc_phase))
}

#[derive(Debug, Clone, Serialize)]
pub struct HtPhasor {
    pub in_phase: Vec<f64>,
    pub quadrature: Vec<f64>,
}

/// Hilbert Transform - Phasor Components.
pub fn ht_phasor(data: &[f64]) -> Result<HtPhasor> {
    let bars = checked_pipeline(data, PERIOD_LOOKBACK, "ht_phasor")?;
    Ok(HtPhasor {
        in_phase: project(&bars, PERIOD_LOOKBACK, |b| b.in_phase),
        quadrature: project(&bars, PERIOD_LOOKBACK, |b| b.quadrature),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct HtSine {
    pub sine: Vec<f64>,
    pub lead_sine: Vec<f64>,
}

/// Hilbert Transform - SineWave.
pub fn ht_sine(data: &[f64]) -> Result<HtSine> {
    let bars = checked_pipeline(data, PHASE_LOOKBACK, "ht_sine")?;
    Ok(HtSine {
        sine: project(&bars, PHASE_LOOKBACK, |b| b.sine),
        lead_sine: project(&bars, PHASE_LOOKBACK, |b| b.lead_sine),
    })
}

/// Hilbert Transform - Trend vs Cycle Mode (1 = trend, 0 = cycle).
pub fn ht_trendmode(data: &[f64]) -> Result<Vec<f64>> {
    let bars = checked_pipeline(data, PHASE_LOOKBACK, "ht_trendmode")?;
    Ok(project(&bars, PHASE_LOOKBACK, |b| b.trend_mode))
}
