// =============================================================================
// Indicator catalog — name-based dispatch for the HTTP layer
// =============================================================================
//
// Every indicator is addressable by a stable snake_case name. `compute` runs
// it over a set of bars with parameters taken from a loosely-typed map (JSON
// body or query string), falling back to the customary defaults.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tracing::debug;

use super::{
    adx, atr, bollinger, channels, ema, hilbert, moving_average, oscillators, patterns, price,
    roc, rsi, statistics, trend, volume,
};
use crate::error::{AnalysisError, Result};
use crate::market_data::Bars;
use crate::types::{MaType, PriceField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Overlap,
    Momentum,
    Volatility,
    Volume,
    Price,
    Statistic,
    Cycle,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Implemented,
}

macro_rules! indicator_kinds {
    ($( $variant:ident => $name:literal, $category:ident, [$($input:ident),*], [$($output:literal),*]; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum IndicatorKind {
            $($variant,)*
        }

        impl IndicatorKind {
            pub const ALL: &'static [IndicatorKind] = &[$(IndicatorKind::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(IndicatorKind::$variant => $name,)*
                }
            }

            pub fn category(self) -> Category {
                match self {
                    $(IndicatorKind::$variant => Category::$category,)*
                }
            }

            /// Bar columns the indicator reads. Single-series indicators list
            /// `close`, which the `source` parameter can redirect.
            pub fn inputs(self) -> &'static [PriceField] {
                match self {
                    $(IndicatorKind::$variant => &[$(PriceField::$input),*],)*
                }
            }

            /// Names of the output columns, in order.
            pub fn outputs(self) -> &'static [&'static str] {
                match self {
                    $(IndicatorKind::$variant => &[$($output),*],)*
                }
            }
        }
    };
}

indicator_kinds! {
    // -- overlap ---------------------------------------------------------------
    Sma => "sma", Overlap, [Close], ["sma"];
    Ema => "ema", Overlap, [Close], ["ema"];
    Wma => "wma", Overlap, [Close], ["wma"];
    Dema => "dema", Overlap, [Close], ["dema"];
    Tema => "tema", Overlap, [Close], ["tema"];
    Trima => "trima", Overlap, [Close], ["trima"];
    Kama => "kama", Overlap, [Close], ["kama"];
    MovingAverage => "moving_average", Overlap, [Close], ["ma"];
    HullMovingAverage => "hull_moving_average", Overlap, [Close], ["hma"];
    VolumeAdjustedMovingAverage => "volume_adjusted_moving_average", Overlap, [Close, Volume], ["vama"];
    Midpoint => "midpoint", Overlap, [Close], ["midpoint"];
    Midprice => "midprice", Overlap, [High, Low], ["midprice"];
    BollingerBands => "bollinger_bands", Overlap, [Close], ["upper", "middle", "lower", "width"];
    KeltnerChannels => "keltner_channels", Overlap, [High, Low, Close], ["high_band", "central", "low_band"];
    DonchianChannel => "donchian_channel", Overlap, [Close], ["high_band", "low_band", "high_indicator", "low_indicator"];
    IchimokuCloud => "ichimoku_cloud", Overlap, [High, Low], ["conversion", "base", "span_a", "span_b"];
    ParabolicSar => "parabolic_sar", Overlap, [High, Low], ["sar"];
    // -- momentum --------------------------------------------------------------
    Rsi => "rsi", Momentum, [Close], ["rsi"];
    StochasticRsi => "stochastic_rsi", Momentum, [Close], ["fast_k", "fast_d"];
    ChandeMomentumOscillator => "chande_momentum_oscillator", Momentum, [Close], ["cmo"];
    RateOfChange => "rate_of_change", Momentum, [Close], ["roc", "rocp", "rocr", "rocr100"];
    Momentum => "momentum", Momentum, [Close], ["mom"];
    Trix => "trix", Momentum, [Close], ["trix"];
    StochasticOscillator => "stochastic_oscillator", Momentum, [High, Low, Close], ["k"];
    WilliamsR => "williams_r", Momentum, [High, Low, Close], ["willr"];
    UltimateOscillator => "ultimate_oscillator", Momentum, [High, Low, Close], ["uo"];
    AbsolutePriceOscillator => "absolute_price_oscillator", Momentum, [Close], ["apo"];
    PercentagePriceOscillator => "percentage_price_oscillator", Momentum, [Close], ["ppo"];
    AwesomeOscillator => "awesome_oscillator", Momentum, [High, Low], ["ao"];
    TrueStrengthIndex => "true_strength_index", Momentum, [Close], ["tsi"];
    Macd => "macd", Momentum, [Close], ["macd", "signal", "histogram"];
    CommodityChannelIndex => "commodity_channel_index", Momentum, [High, Low, Close], ["cci"];
    BalanceOfPower => "balance_of_power", Momentum, [Open, High, Low, Close], ["bop"];
    DetrendedPriceOscillator => "detrended_price_oscillator", Momentum, [Close], ["dpo"];
    KnowSureThing => "know_sure_thing", Momentum, [Close], ["kst", "signal"];
    CoppockCurve => "coppock_curve", Momentum, [Close], ["coppock"];
    MassIndex => "mass_index", Momentum, [High, Low], ["mass_index"];
    Aroon => "aroon", Momentum, [High, Low], ["down", "up", "oscillator"];
    VerticalHorizontalFilter => "vertical_horizontal_filter", Momentum, [Close], ["vhf"];
    PlusDm => "plus_dm", Momentum, [High, Low], ["plus_dm"];
    MinusDm => "minus_dm", Momentum, [High, Low], ["minus_dm"];
    PlusDi => "plus_di", Momentum, [High, Low, Close], ["plus_di"];
    MinusDi => "minus_di", Momentum, [High, Low, Close], ["minus_di"];
    Dx => "dx", Momentum, [High, Low, Close], ["dx"];
    Adx => "adx", Momentum, [High, Low, Close], ["adx"];
    Adxr => "adxr", Momentum, [High, Low, Close], ["adxr"];
    VortexIndicator => "vortex_indicator", Momentum, [High, Low, Close], ["positive", "negative"];
    // -- volatility ------------------------------------------------------------
    TrueRange => "true_range", Volatility, [High, Low, Close], ["true_range"];
    AverageTrueRange => "average_true_range", Volatility, [High, Low, Close], ["atr"];
    NormalizedAverageTrueRange => "normalized_average_true_range", Volatility, [High, Low, Close], ["natr"];
    MovingVolatility => "moving_volatility", Volatility, [Close], ["volatility"];
    // -- volume ----------------------------------------------------------------
    AccumulationDistribution => "accumulation_distribution", Volume, [High, Low, Close, Volume], ["ad"];
    ChaikinOscillator => "chaikin_oscillator", Volume, [High, Low, Close, Volume], ["ad", "oscillator"];
    ChaikinMoneyFlow => "chaikin_money_flow", Volume, [High, Low, Close, Volume], ["cmf"];
    MoneyFlowIndex => "money_flow_index", Volume, [High, Low, Close, Volume], ["mfi"];
    OnBalanceVolume => "on_balance_volume", Volume, [Close, Volume], ["obv"];
    NegativeVolumeIndex => "negative_volume_index", Volume, [Close, Volume], ["nvi"];
    VolumePriceTrend => "volume_price_trend", Volume, [Close, Volume], ["vpt"];
    EaseOfMovement => "ease_of_movement", Volume, [High, Low, Volume], ["eom"];
    ForceIndex => "force_index", Volume, [Close, Volume], ["force_index"];
    Vwap => "vwap", Volume, [High, Low, Volume], ["vwap"];
    // -- price transforms ------------------------------------------------------
    AveragePrice => "average_price", Price, [Open, High, Low, Close], ["avgprice"];
    MedianPrice => "median_price", Price, [High, Low], ["medprice"];
    TypicalPrice => "typical_price", Price, [High, Low, Close], ["typprice"];
    WeightedClosePrice => "weighted_close_price", Price, [High, Low, Close], ["wclprice"];
    // -- statistics ------------------------------------------------------------
    MovingStandardDeviation => "moving_standard_deviation", Statistic, [Close], ["stddev"];
    MovingVariance => "moving_variance", Statistic, [Close], ["var"];
    CorrelationCoefficient => "correlation_coefficient", Statistic, [High, Low], ["correl"];
    LinearRegression => "linear_regression", Statistic, [Close], ["linearreg"];
    LinearRegressionSlope => "linear_regression_slope", Statistic, [Close], ["slope"];
    LinearRegressionIntercept => "linear_regression_intercept", Statistic, [Close], ["intercept"];
    LinearRegressionAngle => "linear_regression_angle", Statistic, [Close], ["angle"];
    TimeSeriesForecast => "time_series_forecast", Statistic, [Close], ["tsf"];
    // -- cycle -----------------------------------------------------------------
    HtTrendline => "ht_trendline", Cycle, [Close], ["trendline"];
    HtDcperiod => "ht_dcperiod", Cycle, [Close], ["dcperiod"];
    HtDcphase => "ht_dcphase", Cycle, [Close], ["dcphase"];
    HtPhasor => "ht_phasor", Cycle, [Close], ["in_phase", "quadrature"];
    HtSine => "ht_sine", Cycle, [Close], ["sine", "lead_sine"];
    HtTrendmode => "ht_trendmode", Cycle, [Close], ["trendmode"];
    // -- patterns --------------------------------------------------------------
    TwoCrows => "two_crows", Pattern, [Open, High, Low, Close], ["two_crows"];
}

impl IndicatorKind {
    pub fn status(self) -> Status {
        Status::Implemented
    }
}

impl std::str::FromStr for IndicatorKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| AnalysisError::UnknownIndicator(s.to_string()))
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for IndicatorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// -----------------------------------------------------------------------------
// Catalog listing
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: IndicatorKind,
    pub category: Category,
    pub status: Status,
    pub inputs: &'static [PriceField],
    pub outputs: &'static [&'static str],
}

pub fn catalog() -> Vec<CatalogEntry> {
    IndicatorKind::ALL
        .iter()
        .map(|&kind| CatalogEntry {
            name: kind,
            category: kind.category(),
            status: kind.status(),
            inputs: kind.inputs(),
            outputs: kind.outputs(),
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Parameters
// -----------------------------------------------------------------------------

/// Named indicator parameters. Values may be JSON numbers or strings (query
/// strings arrive as strings); anything absent takes the indicator default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct IndicatorParams(HashMap<String, serde_json::Value>);

impl IndicatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| AnalysisError::InvalidArgument(format!("parameter '{key}' must be a number")))
    }

    /// A non-negative integer parameter such as a period.
    pub fn period(&self, key: &'static str, default: usize) -> Result<usize> {
        match self.number(key)? {
            None => Ok(default),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            Some(v) => Err(AnalysisError::InvalidArgument(format!(
                "parameter '{key}' must be a non-negative integer, got {v}"
            ))),
        }
    }

    pub fn float(&self, key: &'static str, default: f64) -> Result<f64> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    /// Moving-average type given as a numeric code or a name.
    pub fn ma_type(&self, key: &'static str, default: MaType) -> Result<MaType> {
        match self.get(key) {
            None => Ok(default),
            Some(serde_json::Value::String(s)) => s.parse(),
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .and_then(|c| u8::try_from(c).ok())
                .ok_or_else(|| AnalysisError::InvalidArgument(format!("invalid {key} code {n}")))
                .and_then(MaType::try_from),
            Some(other) => Err(AnalysisError::InvalidArgument(format!(
                "parameter '{key}' has unsupported value {other}"
            ))),
        }
    }

    /// Column a single-series indicator runs on (`source`, default close).
    pub fn source<'a>(&self, bars: &'a Bars) -> Result<&'a [f64]> {
        let field = match self.get("source") {
            None => PriceField::Close,
            Some(serde_json::Value::String(s)) => s.parse()?,
            Some(other) => {
                return Err(AnalysisError::InvalidArgument(format!(
                    "parameter 'source' has unsupported value {other}"
                )))
            }
        };
        bars.require(field)
    }
}

impl From<HashMap<String, String>> for IndicatorParams {
    fn from(query: HashMap<String, String>) -> Self {
        Self(
            query
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        )
    }
}

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------

fn nan_as_null<S: Serializer>(values: &[f64], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(serialize_with = "nan_as_null")]
    pub values: Vec<f64>,
}

/// Named, bar-aligned result columns of one indicator run.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorOutput {
    pub indicator: IndicatorKind,
    pub len: usize,
    pub columns: Vec<Column>,
}

impl IndicatorOutput {
    fn new(kind: IndicatorKind, series: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(series.len(), kind.outputs().len());
        let len = series.first().map_or(0, Vec::len);
        let columns = kind
            .outputs()
            .iter()
            .zip(series)
            .map(|(&name, values)| Column { name, values })
            .collect();
        Self {
            indicator: kind,
            len,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Most recent finite value of every column.
    pub fn latest(&self) -> Vec<(&'static str, Option<f64>)> {
        self.columns
            .iter()
            .map(|c| (c.name, c.values.iter().rev().copied().find(|v| v.is_finite())))
            .collect()
    }
}

// -----------------------------------------------------------------------------
// Dispatch
// -----------------------------------------------------------------------------

/// Run `kind` over `bars`.
pub fn compute(kind: IndicatorKind, bars: &Bars, params: &IndicatorParams) -> Result<IndicatorOutput> {
    debug!(indicator = %kind, len = bars.len(), ?params, "computing indicator");
    let series = compute_series(kind, bars, params)?;
    Ok(IndicatorOutput::new(kind, series))
}

fn compute_series(kind: IndicatorKind, bars: &Bars, p: &IndicatorParams) -> Result<Vec<Vec<f64>>> {
    use IndicatorKind as K;
    use PriceField::{High, Low, Open, Volume};

    let col = |f: PriceField| bars.require(f);
    let one = |v: Vec<f64>| vec![v];

    let out = match kind {
        K::Sma => one(moving_average::sma(p.source(bars)?, p.period("period", 30)?)?),
        K::Ema => one(ema::ema(p.source(bars)?, p.period("period", 30)?)?),
        K::Wma => one(moving_average::wma(p.source(bars)?, p.period("period", 30)?)?),
        K::Dema => one(ema::dema(p.source(bars)?, p.period("period", 30)?)?),
        K::Tema => one(ema::tema(p.source(bars)?, p.period("period", 30)?)?),
        K::Trima => one(moving_average::trima(p.source(bars)?, p.period("period", 30)?)?),
        K::Kama => one(moving_average::kama(p.source(bars)?, p.period("period", 30)?)?),
        K::MovingAverage => one(moving_average::ma(
            p.source(bars)?,
            p.period("period", 30)?,
            p.ma_type("ma_type", MaType::Sma)?,
        )?),
        K::HullMovingAverage => one(moving_average::hull_moving_average(
            p.source(bars)?,
            p.period("period", 16)?,
        )?),
        K::VolumeAdjustedMovingAverage => one(moving_average::volume_adjusted_moving_average(
            p.source(bars)?,
            col(Volume)?,
            p.period("period", 20)?,
        )?),
        K::Midpoint => one(moving_average::midpoint(p.source(bars)?, p.period("period", 14)?)?),
        K::Midprice => one(moving_average::midprice(col(High)?, col(Low)?, p.period("period", 14)?)?),
        K::BollingerBands => {
            let b = bollinger::bollinger_bands(
                p.source(bars)?,
                p.period("period", 20)?,
                p.float("dev_up", 2.0)?,
                p.float("dev_dn", 2.0)?,
                p.ma_type("ma_type", MaType::Sma)?,
            )?;
            vec![b.upper, b.middle, b.lower, b.width]
        }
        K::KeltnerChannels => {
            let k = channels::keltner_channels(
                col(High)?,
                col(Low)?,
                p.source(bars)?,
                p.period("period", 10)?,
            )?;
            vec![k.high_band, k.central, k.low_band]
        }
        K::DonchianChannel => {
            let d = channels::donchian_channel(p.source(bars)?, p.period("period", 20)?)?;
            vec![d.high_band, d.low_band, d.high_indicator, d.low_indicator]
        }
        K::IchimokuCloud => {
            let i = channels::ichimoku_cloud(
                col(High)?,
                col(Low)?,
                p.period("short", 9)?,
                p.period("medium", 26)?,
                p.period("long", 52)?,
            )?;
            vec![i.conversion, i.base, i.span_a, i.span_b]
        }
        K::ParabolicSar => one(trend::parabolic_sar(
            col(High)?,
            col(Low)?,
            p.float("acceleration", 0.02)?,
            p.float("maximum", 0.2)?,
        )?),

        K::Rsi => one(rsi::rsi(p.source(bars)?, p.period("period", 14)?)?),
        K::StochasticRsi => {
            let s = rsi::stochastic_rsi(
                p.source(bars)?,
                p.period("period", 14)?,
                p.period("fastk_period", 5)?,
                p.period("fastd_period", 3)?,
                p.ma_type("fastd_ma_type", MaType::Sma)?,
            )?;
            vec![s.fast_k, s.fast_d]
        }
        K::ChandeMomentumOscillator => one(rsi::chande_momentum_oscillator(
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::RateOfChange => {
            let r = roc::rate_of_change(p.source(bars)?, p.period("period", 10)?)?;
            vec![r.roc, r.rocp, r.rocr, r.rocr100]
        }
        K::Momentum => one(roc::momentum(p.source(bars)?, p.period("period", 10)?)?),
        K::Trix => one(roc::trix(p.source(bars)?, p.period("period", 30)?)?),
        K::StochasticOscillator => one(oscillators::stochastic_oscillator(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::WilliamsR => one(oscillators::williams_r(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::UltimateOscillator => one(oscillators::ultimate_oscillator(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("short", 7)?,
            p.period("medium", 14)?,
            p.period("long", 28)?,
        )?),
        K::AbsolutePriceOscillator => one(oscillators::absolute_price_oscillator(
            p.source(bars)?,
            p.period("fast", 12)?,
            p.period("slow", 26)?,
            p.ma_type("ma_type", MaType::Sma)?,
        )?),
        K::PercentagePriceOscillator => one(oscillators::percentage_price_oscillator(
            p.source(bars)?,
            p.period("fast", 12)?,
            p.period("slow", 26)?,
            p.ma_type("ma_type", MaType::Sma)?,
        )?),
        K::AwesomeOscillator => one(oscillators::awesome_oscillator(
            col(High)?,
            col(Low)?,
            p.period("short", 5)?,
            p.period("long", 34)?,
        )?),
        K::TrueStrengthIndex => one(oscillators::true_strength_index(
            p.source(bars)?,
            p.period("long", 25)?,
            p.period("short", 13)?,
        )?),
        K::Macd => {
            let m = oscillators::macd(
                p.source(bars)?,
                p.period("fast", 12)?,
                p.period("slow", 26)?,
                p.period("signal", 9)?,
            )?;
            vec![m.macd, m.signal, m.histogram]
        }
        K::CommodityChannelIndex => one(oscillators::commodity_channel_index(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("period", 20)?,
        )?),
        K::BalanceOfPower => one(oscillators::balance_of_power(
            col(Open)?,
            col(High)?,
            col(Low)?,
            p.source(bars)?,
        )?),
        K::DetrendedPriceOscillator => one(oscillators::detrended_price_oscillator(
            p.source(bars)?,
            p.period("period", 20)?,
        )?),
        K::KnowSureThing => {
            let d = oscillators::KstParams::default();
            let params = oscillators::KstParams {
                roc: [
                    p.period("r1", d.roc[0])?,
                    p.period("r2", d.roc[1])?,
                    p.period("r3", d.roc[2])?,
                    p.period("r4", d.roc[3])?,
                ],
                smoothing: [
                    p.period("n1", d.smoothing[0])?,
                    p.period("n2", d.smoothing[1])?,
                    p.period("n3", d.smoothing[2])?,
                    p.period("n4", d.smoothing[3])?,
                ],
                signal: p.period("nsig", d.signal)?,
            };
            let k = oscillators::know_sure_thing(p.source(bars)?, &params)?;
            vec![k.kst, k.signal]
        }
        K::CoppockCurve => one(oscillators::coppock_curve(p.source(bars)?, p.period("period", 10)?)?),
        K::MassIndex => one(oscillators::mass_index(
            col(High)?,
            col(Low)?,
            p.period("short", 9)?,
            p.period("long", 25)?,
        )?),
        K::Aroon => {
            let a = oscillators::aroon(col(High)?, col(Low)?, p.period("period", 14)?)?;
            vec![a.down, a.up, a.oscillator]
        }
        K::VerticalHorizontalFilter => one(oscillators::vertical_horizontal_filter(
            p.source(bars)?,
            p.period("period", 28)?,
        )?),
        K::PlusDm => one(adx::plus_dm(col(High)?, col(Low)?, p.period("period", 14)?)?),
        K::MinusDm => one(adx::minus_dm(col(High)?, col(Low)?, p.period("period", 14)?)?),
        K::PlusDi => one(adx::plus_di(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?),
        K::MinusDi => one(adx::minus_di(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?),
        K::Dx => one(adx::dx(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?),
        K::Adx => one(adx::adx(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?),
        K::Adxr => one(adx::adxr(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?),
        K::VortexIndicator => {
            let v = trend::vortex_indicator(col(High)?, col(Low)?, p.source(bars)?, p.period("period", 14)?)?;
            vec![v.positive, v.negative]
        }

        K::TrueRange => one(atr::true_range(col(High)?, col(Low)?, p.source(bars)?)?),
        K::AverageTrueRange => one(atr::average_true_range(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::NormalizedAverageTrueRange => one(atr::normalized_average_true_range(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::MovingVolatility => {
            let prices = p.source(bars)?;
            let returns = crate::analytics::returns::daily_returns(prices)?;
            one(trend::moving_volatility(&returns, p.period("period", 20)?)?)
        }

        K::AccumulationDistribution => one(volume::accumulation_distribution(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            col(Volume)?,
        )?),
        K::ChaikinOscillator => {
            let c = volume::chaikin_oscillator(
                col(High)?,
                col(Low)?,
                p.source(bars)?,
                col(Volume)?,
                p.period("fast", 3)?,
                p.period("slow", 10)?,
            )?;
            vec![c.ad, c.oscillator]
        }
        K::ChaikinMoneyFlow => one(volume::chaikin_money_flow(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            col(Volume)?,
            p.period("period", 20)?,
        )?),
        K::MoneyFlowIndex => one(volume::money_flow_index(
            col(High)?,
            col(Low)?,
            p.source(bars)?,
            col(Volume)?,
            p.period("period", 14)?,
        )?),
        K::OnBalanceVolume => one(volume::on_balance_volume(p.source(bars)?, col(Volume)?)?),
        K::NegativeVolumeIndex => one(volume::negative_volume_index(p.source(bars)?, col(Volume)?)?),
        K::VolumePriceTrend => one(volume::volume_price_trend(p.source(bars)?, col(Volume)?)?),
        K::EaseOfMovement => one(volume::ease_of_movement(
            col(High)?,
            col(Low)?,
            col(Volume)?,
            p.period("period", 14)?,
        )?),
        K::ForceIndex => one(volume::force_index(p.source(bars)?, col(Volume)?, p.period("period", 13)?)?),
        K::Vwap => one(volume::vwap(col(High)?, col(Low)?, col(Volume)?)?),

        K::AveragePrice => one(price::average_price(col(Open)?, col(High)?, col(Low)?, p.source(bars)?)?),
        K::MedianPrice => one(price::median_price(col(High)?, col(Low)?)?),
        K::TypicalPrice => one(price::typical_price(col(High)?, col(Low)?, p.source(bars)?)?),
        K::WeightedClosePrice => one(price::weighted_close_price(col(High)?, col(Low)?, p.source(bars)?)?),

        K::MovingStandardDeviation => one(statistics::moving_standard_deviation(
            p.source(bars)?,
            p.period("period", 5)?,
            p.float("nbdev", 1.0)?,
        )?),
        K::MovingVariance => one(statistics::moving_variance(p.source(bars)?, p.period("period", 5)?)?),
        K::CorrelationCoefficient => one(statistics::correlation_coefficient(
            col(High)?,
            col(Low)?,
            p.period("period", 30)?,
        )?),
        K::LinearRegression => one(statistics::linear_regression(p.source(bars)?, p.period("period", 14)?)?),
        K::LinearRegressionSlope => one(statistics::linear_regression_slope(
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::LinearRegressionIntercept => one(statistics::linear_regression_intercept(
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::LinearRegressionAngle => one(statistics::linear_regression_angle(
            p.source(bars)?,
            p.period("period", 14)?,
        )?),
        K::TimeSeriesForecast => one(statistics::time_series_forecast(
            p.source(bars)?,
            p.period("period", 14)?,
        )?),

        K::HtTrendline => one(hilbert::ht_trendline(p.source(bars)?)?),
        K::HtDcperiod => one(hilbert::ht_dcperiod(p.source(bars)?)?),
        K::HtDcphase => one(hilbert::ht_dcphase(p.source(bars)?)?),
        K::HtPhasor => {
            let h = hilbert::ht_phasor(p.source(bars)?)?;
            vec![h.in_phase, h.quadrature]
        }
        K::HtSine => {
            let h = hilbert::ht_sine(p.source(bars)?)?;
            vec![h.sine, h.lead_sine]
        }
        K::HtTrendmode => one(hilbert::ht_trendmode(p.source(bars)?)?),

        K::TwoCrows => one(patterns::two_crows(col(Open)?, col(High)?, col(Low)?, p.source(bars)?)?),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    fn sample_bars(n: usize) -> Bars {
        let close: Vec<f64> = (0..n)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
            .collect();
        Bars {
            open: close.iter().map(|c| c - 0.3).collect(),
            high: close.iter().map(|c| c + 1.0).collect(),
            low: close.iter().map(|c| c - 1.0).collect(),
            volume: (0..n).map(|i| 1000.0 + (i % 7) as f64 * 10.0).collect(),
            close,
        }
    }

    #[test]
    fn names_round_trip_and_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for &kind in IndicatorKind::ALL {
            assert!(seen.insert(kind.name()), "duplicate name {}", kind.name());
            assert_eq!(kind.name().parse::<IndicatorKind>().unwrap(), kind);
        }
        assert_eq!("Bollinger-Bands".parse::<IndicatorKind>().unwrap(), IndicatorKind::BollingerBands);
        assert_eq!(
            "mama".parse::<IndicatorKind>(),
            Err(AnalysisError::UnknownIndicator("mama".into()))
        );
    }

    #[test]
    fn every_indicator_runs_with_defaults() {
        let bars = sample_bars(200);
        let params = IndicatorParams::new();
        for &kind in IndicatorKind::ALL {
            let out = compute(kind, &bars, &params)
                .unwrap_or_else(|e| panic!("{kind} failed: {e}"));
            assert_eq!(out.columns.len(), kind.outputs().len(), "{kind}");
            for column in &out.columns {
                assert_eq!(column.values.len(), 200, "{kind}.{}", column.name);
            }
        }
    }

    #[test]
    fn params_accept_strings_and_numbers() {
        let bars = sample_bars(50);
        let from_query: IndicatorParams =
            HashMap::from([("period".to_string(), "5".to_string())]).into();
        let from_json = IndicatorParams::new().with("period", 5);
        let a = compute(IndicatorKind::Sma, &bars, &from_query).unwrap();
        let b = compute(IndicatorKind::Sma, &bars, &from_json).unwrap();
        assert_close(a.columns[0].values[49], b.columns[0].values[49]);
        assert!(a.columns[0].values[3].is_nan());
    }

    #[test]
    fn bad_params_are_rejected() {
        let bars = sample_bars(50);
        let p = IndicatorParams::new().with("period", -3);
        assert!(matches!(
            compute(IndicatorKind::Rsi, &bars, &p),
            Err(AnalysisError::InvalidArgument(_))
        ));
        let p = IndicatorParams::new().with("period", 2.5);
        assert!(compute(IndicatorKind::Rsi, &bars, &p).is_err());
        let p = IndicatorParams::new().with("ma_type", 8);
        assert!(compute(IndicatorKind::BollingerBands, &bars, &p).is_err());
        let p = IndicatorParams::new().with("ma_type", "ema");
        assert!(compute(IndicatorKind::BollingerBands, &bars, &p).is_ok());
    }

    #[test]
    fn source_parameter_selects_column() {
        let bars = sample_bars(30);
        let p = IndicatorParams::new().with("period", 1).with("source", "high");
        let out = compute(IndicatorKind::Sma, &bars, &p).unwrap();
        assert_close(out.columns[0].values[10], bars.high[10]);
    }

    #[test]
    fn missing_columns_are_reported() {
        let bars = Bars {
            close: vec![1.0, 2.0, 3.0],
            ..Bars::default()
        };
        assert!(matches!(
            compute(IndicatorKind::AverageTrueRange, &bars, &IndicatorParams::new()),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn output_serializes_nan_as_null() {
        let bars = Bars {
            close: vec![1.0, 2.0, 3.0],
            ..Bars::default()
        };
        let out = compute(IndicatorKind::Sma, &bars, &IndicatorParams::new().with("period", 2)).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["indicator"], "sma");
        assert_eq!(json["columns"][0]["name"], "sma");
        assert_eq!(json["columns"][0]["values"], serde_json::json!([null, 1.5, 2.5]));
        assert_eq!(out.latest(), vec![("sma", Some(2.5))]);
        assert!(out.column("sma").is_some());
    }

    #[test]
    fn latest_skips_trailing_gaps() {
        let out = IndicatorOutput::new(IndicatorKind::Sma, vec![vec![1.0, 2.0, f64::NAN]]);
        assert_eq!(out.latest(), vec![("sma", Some(2.0))]);
        let empty = IndicatorOutput::new(IndicatorKind::Sma, vec![vec![f64::NAN; 3]]);
        assert_eq!(empty.latest(), vec![("sma", None)]);
    }

    #[test]
    fn catalog_lists_everything() {
        let entries = catalog();
        assert_eq!(entries.len(), IndicatorKind::ALL.len());
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["status"], "implemented");
        assert_eq!(json["category"], "overlap");
        assert_eq!(json["inputs"], serde_json::json!(["close"]));
    }
}
