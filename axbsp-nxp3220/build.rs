use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

const CONFIG_ENV: &str = "NXP3220_BOARD_CONFIG";
const DEFAULT_CONFIG: &str = "board/nxp3220.toml";

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BoardConfig {
    #[serde(default)]
    secure: bool,
    pll: PllConfig,
    cmu: CmuConfig,
    opp: Vec<OppConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PllConfig {
    variant: String,
    #[serde(default = "default_ref_clk")]
    ref_clk: u64,
    #[serde(default = "default_max_polls")]
    max_polls: u32,
    base: u64,
}

#[derive(Deserialize)]
struct CmuConfig {
    base: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct OppConfig {
    hz: u64,
    microvolt: u32,
    microvolt_min: Option<u32>,
    microvolt_max: Option<u32>,
    #[serde(default)]
    clock_latency_ns: u32,
    #[serde(default)]
    suspend: bool,
    #[serde(default)]
    turbo: bool,
}

fn default_ref_clk() -> u64 {
    24_000_000
}

fn default_max_polls() -> u32 {
    100_000
}

fn validate(cfg: &BoardConfig) -> Result<(), String> {
    let variant = match cfg.pll.variant.as_str() {
        "pll2555" | "pll2651" => &cfg.pll.variant,
        other => return Err(format!("unknown PLL variant `{other}`")),
    };
    if cfg.pll.max_polls == 0 {
        return Err(format!("{variant}: max-polls must be non-zero"));
    }
    if cfg.opp.is_empty() {
        return Err("no operating points".into());
    }
    for pair in cfg.opp.windows(2) {
        if pair[0].hz >= pair[1].hz {
            return Err(format!(
                "operating points not ascending at {} Hz",
                pair[1].hz
            ));
        }
    }
    for opp in &cfg.opp {
        let min = opp.microvolt_min.unwrap_or(opp.microvolt);
        let max = opp.microvolt_max.unwrap_or(opp.microvolt);
        if !(min <= opp.microvolt && opp.microvolt <= max) {
            return Err(format!("{} Hz: voltage window {min}..{max} uV", opp.hz));
        }
    }
    if cfg.opp.iter().filter(|opp| opp.suspend).count() > 1 {
        return Err("more than one suspend operating point".into());
    }
    Ok(())
}

fn generate(cfg: &BoardConfig) -> String {
    let variant = match cfg.pll.variant.as_str() {
        "pll2651" => "Pll2651",
        _ => "Pll2555",
    };

    let mut out = String::new();
    writeln!(out, "// Generated from the board configuration.").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "pub const PLL_VARIANT: bsp_nexell::PllVariant = bsp_nexell::PllVariant::{variant};"
    )
    .unwrap();
    writeln!(out, "pub const REF_CLK_HZ: u64 = {};", cfg.pll.ref_clk).unwrap();
    writeln!(out, "pub const PLL_MAX_POLLS: u32 = {};", cfg.pll.max_polls).unwrap();
    writeln!(out, "pub const PLL_CPU_BASE: u64 = {:#x};", cfg.pll.base).unwrap();
    writeln!(out, "pub const CMU_CPU_BASE: u64 = {:#x};", cfg.cmu.base).unwrap();
    writeln!(out, "pub const SECURE_ACCESS: bool = {};", cfg.secure).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "pub static OPP_TABLE: &[crate::opp::OperatingPoint] = &[").unwrap();
    for opp in &cfg.opp {
        writeln!(
            out,
            "    crate::opp::OperatingPoint {{ freq_hz: {}, voltage: crate::opp::VoltageTriplet {{ \
             min_uv: {}, target_uv: {}, max_uv: {} }}, clock_latency_ns: {}, suspend: {}, turbo: {} }},",
            opp.hz,
            opp.microvolt_min.unwrap_or(opp.microvolt),
            opp.microvolt,
            opp.microvolt_max.unwrap_or(opp.microvolt),
            opp.clock_latency_ns,
            opp.suspend,
            opp.turbo,
        )
        .unwrap();
    }
    writeln!(out, "];").unwrap();
    out
}

fn main() {
    println!("cargo:rerun-if-env-changed={CONFIG_ENV}");

    let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.into());
    println!("cargo:rerun-if-changed={path}");

    let text = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read board config {path}: {err}"));
    let cfg: BoardConfig =
        toml::from_str(&text).unwrap_or_else(|err| panic!("invalid board config {path}: {err}"));
    if let Err(err) = validate(&cfg) {
        panic!("invalid board config {path}: {err}");
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    fs::write(out_dir.join("board.rs"), generate(&cfg)).expect("failed to write board.rs");
}
