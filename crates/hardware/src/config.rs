//! Configuration system for the simulation harness.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the harness. It provides:
//! 1. **Defaults:** Baseline parameters (clock, memory, cache geometry, pipeline widths).
//! 2. **Structures:** Hierarchical config for memory, caches, core, bus and interrupts.
//! 3. **Enums:** Core type, branch predictor, memory controller and replacement policy.
//! 4. **Validation:** [`Config::validate`] rejects contradictory parameters before any
//!    component is built.
//!
//! Configuration is supplied as camelCase JSON (see [`Config::from_json`]) or built from
//! [`Config::default()`]. Sizes accept integers or strings such as `"32kB"` and `"512MB"`;
//! the clock accepts `"1GHz"`-style strings or a plain frequency in Hz.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::common::error::ConfigError;
use crate::common::AddrRange;
use crate::isa::Workload;

/// Default configuration constants for the harness.
///
/// Cache parameters follow the reference SMT configuration: 32 kB, 4-way, two-cycle
/// tag and data lookups, one-cycle response, 16 MSHRs with four targets each.
mod defaults {
    /// Core clock frequency in Hz (1 GHz).
    pub const CLOCK_HZ: u64 = 1_000_000_000;

    /// Size of main memory (512 MiB).
    pub const MEMORY_SIZE: u64 = 512 * 1024 * 1024;

    /// Fixed DRAM channel latency in core cycles.
    pub const MEMORY_LATENCY: u64 = 50;

    /// Maximum requests in flight in the DRAM channel.
    pub const MEMORY_QUEUE_DEPTH: usize = 32;

    /// CAS (Column Access Strobe) latency in cycles.
    pub const T_CAS: u64 = 14;

    /// RAS (Row Access Strobe) latency in cycles.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in cycles.
    pub const T_PRE: u64 = 14;

    /// Default cache size in bytes (32 KiB).
    pub const CACHE_SIZE: u64 = 32 * 1024;

    /// Default cache associativity.
    pub const CACHE_WAYS: usize = 4;

    /// Default cache line size in bytes.
    pub const CACHE_LINE: usize = 64;

    /// Tag lookup latency in cycles.
    pub const TAG_LATENCY: u64 = 2;

    /// Data array latency in cycles.
    pub const DATA_LATENCY: u64 = 2;

    /// Miss response latency in cycles.
    pub const RESPONSE_LATENCY: u64 = 1;

    /// Outstanding misses per cache.
    pub const MSHRS: usize = 16;

    /// Requestors merged into one outstanding miss.
    pub const TARGETS_PER_MSHR: usize = 4;

    /// Pipeline widths (fetch, dispatch, issue, commit).
    pub const PIPELINE_WIDTH: usize = 4;

    /// Reorder buffer entries per thread.
    pub const ROB_ENTRIES: usize = 64;

    /// Post-commit store buffer entries per thread.
    pub const STORE_BUFFER_ENTRIES: usize = 16;

    /// Local branch predictor history table entries.
    pub const LOCAL_HISTORY_ENTRIES: usize = 256;

    /// Local history length in bits (counter table has `2^bits` entries).
    pub const LOCAL_HISTORY_BITS: u32 = 8;

    /// Bus traversal latency in cycles.
    pub const BUS_LATENCY: u64 = 1;

    /// Requests buffered per bus port.
    pub const BUS_QUEUE_DEPTH: usize = 16;

    /// Interrupt controller PIO base (1 GiB, above default memory).
    pub const INTERRUPT_BASE: u64 = 0x4000_0000;

    /// Interrupt controller access latency in cycles.
    pub const INTERRUPT_LATENCY: u64 = 2;

    /// Seed for randomized replacement.
    pub const SEED: u64 = 123_456_789;

    /// Upper bound on hardware threads per core.
    pub const MAX_THREADS: usize = 8;
}

/// Maximum hardware thread contexts per core.
pub const MAX_THREADS: usize = defaults::MAX_THREADS;

/// Simulated ticks per second; one tick is one picosecond.
pub const TICKS_PER_SECOND: u64 = 1_000_000_000_000;

/// Pipeline organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CoreType {
    /// Issue in program order; the first stalled instruction blocks younger ones.
    InOrder,
    /// Issue any ready instruction, oldest first; commit in order.
    #[default]
    #[serde(alias = "O3")]
    OutOfOrder,
}

/// Branch prediction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BranchPredictor {
    /// No prediction: fetch waits for every conditional branch to resolve.
    Null,
    /// Per-branch local history indexing two-bit counters.
    #[default]
    Local,
}

/// Memory controller implementation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Fixed channel latency.
    #[default]
    Simple,
    /// Open-row DRAM timing (tCAS/tRAS/tPRE).
    #[serde(alias = "DRAM")]
    Dram,
}

/// Cache replacement policy algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// First In First Out.
    #[serde(alias = "Fifo")]
    Fifo,
    /// Seeded pseudo-random.
    #[serde(alias = "Random")]
    Random,
}

/// A byte count that deserializes from an integer or a string like `"32kB"`.
///
/// Units are binary: `kB`, `KiB` and `KB` all mean 1024 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_unit(s);
        let value: u64 = num
            .parse()
            .map_err(|_| ConfigError::invalid(format!("bad size {s:?}")))?;
        let scale = match unit.to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "kb" | "kib" => 1 << 10,
            "mb" | "mib" => 1 << 20,
            "gb" | "gib" => 1 << 30,
            _ => return Err(ConfigError::invalid(format!("unknown size unit in {s:?}"))),
        };
        value
            .checked_mul(scale)
            .map(Self)
            .ok_or_else(|| ConfigError::invalid(format!("size {s:?} overflows")))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

/// A clock frequency in Hz that deserializes from an integer or a string like `"1GHz"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency(pub u64);

impl Frequency {
    /// Clock period in ticks (picoseconds), or `None` for frequencies that
    /// do not divide one second into a whole number of picoseconds.
    pub const fn period_ticks(&self) -> Option<u64> {
        if self.0 == 0 || TICKS_PER_SECOND % self.0 != 0 {
            return None;
        }
        Some(TICKS_PER_SECOND / self.0)
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_unit(s);
        let value: u64 = num
            .parse()
            .map_err(|_| ConfigError::invalid(format!("bad clock {s:?}")))?;
        let scale = match unit.to_ascii_lowercase().as_str() {
            "" | "hz" => 1,
            "khz" => 1_000,
            "mhz" => 1_000_000,
            "ghz" => 1_000_000_000,
            _ => return Err(ConfigError::invalid(format!("unknown clock unit in {s:?}"))),
        };
        value
            .checked_mul(scale)
            .map(Self)
            .ok_or_else(|| ConfigError::invalid(format!("clock {s:?} overflows")))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

/// Splits `"32kB"` into `("32", "kB")`.
fn split_unit(s: &str) -> (&str, &str) {
    let s = s.trim();
    let cut = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (&s[..cut], s[cut..].trim())
}

/// Integer-or-string helper for [`ByteSize`] and [`Frequency`].
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(d)? {
            NumberOrText::Number(n) => Ok(Self(n)),
            NumberOrText::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(d)? {
            NumberOrText::Number(n) => Ok(Self(n)),
            NumberOrText::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Root configuration structure containing all harness settings.
///
/// # Examples
///
/// ```
/// use pipesim_core::config::{BranchPredictor, Config, CoreType};
///
/// let json = r#"{
///     "clock": "1GHz",
///     "memorySize": "512MB",
///     "cache": {
///         "l1i": { "cacheSize": "16kB", "cacheAssociativity": 2 },
///         "l1d": { "cacheSize": "16kB", "cacheAssociativity": 2, "mshrCount": 4 }
///     },
///     "core": { "coreType": "InOrder", "branchPredictor": "Null" },
///     "workloadPaths": ["hello.s"]
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.core.core_type, CoreType::InOrder);
/// assert_eq!(config.core.branch_predictor, BranchPredictor::Null);
/// assert_eq!(config.cache.l1d.cache_size.0, 16 * 1024);
/// assert_eq!(config.cache.l1d.mshr_count, 4);
/// assert_eq!(config.clock_period(), 1000);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Core clock
    #[serde(default = "Config::default_clock")]
    pub clock: Frequency,

    /// Size of main memory, mapped at address 0
    #[serde(default = "Config::default_memory_size")]
    pub memory_size: ByteSize,

    /// DRAM channel parameters
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Cache hierarchy
    #[serde(default)]
    pub cache: CacheHierarchyConfig,

    /// Core pipeline
    #[serde(default)]
    pub core: CoreConfig,

    /// System bus
    #[serde(default)]
    pub bus: BusConfig,

    /// Interrupt controller
    #[serde(default)]
    pub interrupts: InterruptConfig,

    /// One workload per thread context
    #[serde(default)]
    pub workload_paths: Vec<Workload>,

    /// Tick budget; the run ends at the last whole cycle that fits in it
    /// (`None` runs until every thread exits)
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// Seed for randomized replacement
    #[serde(default = "Config::default_seed")]
    pub seed: u64,
}

impl Config {
    /// Returns the default clock.
    const fn default_clock() -> Frequency {
        Frequency(defaults::CLOCK_HZ)
    }

    /// Returns the default memory size.
    const fn default_memory_size() -> ByteSize {
        ByteSize(defaults::MEMORY_SIZE)
    }

    /// Returns the default seed.
    const fn default_seed() -> u64 {
        defaults::SEED
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown keys. The result is
    /// not validated; call [`Config::validate`] or let the builder do it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Clock period in ticks. Only meaningful after [`Config::validate`] succeeded.
    pub fn clock_period(&self) -> u64 {
        self.clock.period_ticks().unwrap_or(1)
    }

    /// Address window of main memory.
    pub const fn memory_range(&self) -> AddrRange {
        AddrRange::new(0, self.memory_size.0)
    }

    /// Address window of the interrupt controller (8 bytes per thread context).
    pub const fn interrupt_range(&self) -> AddrRange {
        AddrRange::new(self.interrupts.base, 8 * self.core.thread_count as u64)
    }

    /// Checks the configuration for contradictory or out-of-range parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.period_ticks().is_none() {
            return Err(ConfigError::invalid(format!(
                "clock {} has no whole picosecond period",
                self.clock
            )));
        }
        if self.memory_size.0 == 0 {
            return Err(ConfigError::invalid("memorySize must be non-zero"));
        }
        self.memory.validate()?;
        self.cache.l1i.validate("l1i")?;
        self.cache.l1d.validate("l1d")?;
        if let Some(l2) = &self.cache.l2 {
            l2.validate("l2")?;
            for (name, l1) in [("l1i", &self.cache.l1i), ("l1d", &self.cache.l1d)] {
                if l1.line_size > l2.line_size {
                    return Err(ConfigError::invalid(format!(
                        "{name} line size {} exceeds l2 line size {}",
                        l1.line_size, l2.line_size
                    )));
                }
            }
        }
        self.core.validate()?;
        self.bus.validate()?;
        if self.interrupt_range().overlaps(&self.memory_range()) {
            return Err(ConfigError::invalid(format!(
                "interrupt controller window {} overlaps memory {}",
                self.interrupt_range(),
                self.memory_range()
            )));
        }
        let period = self.clock_period();
        if let Some(max) = self.max_ticks.filter(|&max| max < period) {
            return Err(ConfigError::invalid(format!(
                "maxTicks {max} is shorter than one clock period ({period} ticks)"
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock: Self::default_clock(),
            memory_size: Self::default_memory_size(),
            memory: MemoryConfig::default(),
            cache: CacheHierarchyConfig::default(),
            core: CoreConfig::default(),
            bus: BusConfig::default(),
            interrupts: InterruptConfig::default(),
            workload_paths: Vec::new(),
            max_ticks: None,
            seed: defaults::SEED,
        }
    }
}

/// DRAM channel configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryConfig {
    /// Timing model
    #[serde(default)]
    pub controller: MemoryController,

    /// Fixed latency in cycles (`Simple` controller)
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// Maximum requests in flight
    #[serde(default = "MemoryConfig::default_queue_depth")]
    pub queue_depth: usize,

    /// Column access latency (`Dram` controller)
    #[serde(default = "MemoryConfig::default_t_cas")]
    pub t_cas: u64,

    /// Row activate latency (`Dram` controller)
    #[serde(default = "MemoryConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency (`Dram` controller)
    #[serde(default = "MemoryConfig::default_t_pre")]
    pub t_pre: u64,
}

impl MemoryConfig {
    /// Returns the default fixed latency.
    const fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    /// Returns the default channel queue depth.
    const fn default_queue_depth() -> usize {
        defaults::MEMORY_QUEUE_DEPTH
    }

    /// Returns the default CAS latency.
    const fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    /// Returns the default RAS latency.
    const fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    /// Returns the default precharge latency.
    const fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::invalid("memory.queueDepth must be non-zero"));
        }
        let latency = match self.controller {
            MemoryController::Simple => self.latency,
            MemoryController::Dram => self.t_cas,
        };
        if latency == 0 {
            return Err(ConfigError::invalid("memory latency must be at least one cycle"));
        }
        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            controller: MemoryController::default(),
            latency: defaults::MEMORY_LATENCY,
            queue_depth: defaults::MEMORY_QUEUE_DEPTH,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
        }
    }
}

/// Cache hierarchy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheHierarchyConfig {
    /// L1 instruction cache
    #[serde(default)]
    pub l1i: CacheConfig,

    /// L1 data cache
    #[serde(default)]
    pub l1d: CacheConfig,

    /// Optional unified L2 behind a private bus
    #[serde(default)]
    pub l2: Option<CacheConfig>,
}

/// Individual cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    /// Total capacity
    #[serde(default = "CacheConfig::default_size")]
    pub cache_size: ByteSize,

    /// Ways per set
    #[serde(default = "CacheConfig::default_ways")]
    pub cache_associativity: usize,

    /// Line size in bytes (power of two)
    #[serde(default = "CacheConfig::default_line")]
    pub line_size: usize,

    /// Tag lookup latency in cycles
    #[serde(default = "CacheConfig::default_tag_latency")]
    pub tag_latency: u64,

    /// Data array latency in cycles
    #[serde(default = "CacheConfig::default_data_latency")]
    pub data_latency: u64,

    /// Latency from fill arrival to response
    #[serde(default = "CacheConfig::default_response_latency")]
    pub response_latency: u64,

    /// Outstanding misses
    #[serde(default = "CacheConfig::default_mshrs")]
    pub mshr_count: usize,

    /// Requestors merged per outstanding miss
    #[serde(default = "CacheConfig::default_targets")]
    pub targets_per_mshr: usize,

    /// Replacement policy
    #[serde(default)]
    pub replacement_policy: ReplacementPolicy,
}

impl CacheConfig {
    /// Returns the default cache size.
    const fn default_size() -> ByteSize {
        ByteSize(defaults::CACHE_SIZE)
    }

    /// Returns the default associativity.
    const fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    /// Returns the default line size.
    const fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    /// Returns the default tag latency.
    const fn default_tag_latency() -> u64 {
        defaults::TAG_LATENCY
    }

    /// Returns the default data latency.
    const fn default_data_latency() -> u64 {
        defaults::DATA_LATENCY
    }

    /// Returns the default response latency.
    const fn default_response_latency() -> u64 {
        defaults::RESPONSE_LATENCY
    }

    /// Returns the default MSHR count.
    const fn default_mshrs() -> usize {
        defaults::MSHRS
    }

    /// Returns the default targets per MSHR.
    const fn default_targets() -> usize {
        defaults::TARGETS_PER_MSHR
    }

    /// Number of sets implied by size, line size and associativity.
    pub const fn num_sets(&self) -> usize {
        let set_bytes = self.line_size * self.cache_associativity;
        if set_bytes == 0 {
            0
        } else {
            self.cache_size.0 as usize / set_bytes
        }
    }

    /// Number of lines the cache can hold.
    pub const fn num_lines(&self) -> usize {
        self.num_sets() * self.cache_associativity
    }

    /// Validates the geometry and resource counts of one cache.
    ///
    /// # Arguments
    ///
    /// * `name` - Cache label used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] for zero MSHRs, zero targets, a line size
    /// that is not a power of two, or a size that is not a multiple of `lineSize × ways`.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.mshr_count == 0 {
            return Err(ConfigError::invalid(format!("{name}.mshrCount must be at least 1")));
        }
        if self.targets_per_mshr == 0 {
            return Err(ConfigError::invalid(format!(
                "{name}.targetsPerMshr must be at least 1"
            )));
        }
        if self.cache_associativity == 0 {
            return Err(ConfigError::invalid(format!(
                "{name}.cacheAssociativity must be at least 1"
            )));
        }
        if self.line_size < crate::isa::WORD_BYTES || !self.line_size.is_power_of_two() {
            return Err(ConfigError::invalid(format!(
                "{name}.lineSize {} must be a power of two of at least {} bytes",
                self.line_size,
                crate::isa::WORD_BYTES
            )));
        }
        let set_bytes = (self.line_size * self.cache_associativity) as u64;
        if self.cache_size.0 == 0 || self.cache_size.0 % set_bytes != 0 {
            return Err(ConfigError::invalid(format!(
                "{name}.cacheSize {} is not a non-zero multiple of lineSize x associativity ({set_bytes})",
                self.cache_size
            )));
        }
        if self.tag_latency + self.data_latency == 0 {
            return Err(ConfigError::invalid(format!(
                "{name} hit latency must be at least one cycle"
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: Self::default_size(),
            cache_associativity: defaults::CACHE_WAYS,
            line_size: defaults::CACHE_LINE,
            tag_latency: defaults::TAG_LATENCY,
            data_latency: defaults::DATA_LATENCY,
            response_latency: defaults::RESPONSE_LATENCY,
            mshr_count: defaults::MSHRS,
            targets_per_mshr: defaults::TARGETS_PER_MSHR,
            replacement_policy: ReplacementPolicy::default(),
        }
    }
}

/// Core pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreConfig {
    /// In-order or out-of-order issue
    #[serde(default)]
    pub core_type: CoreType,

    /// Branch predictor
    #[serde(default)]
    pub branch_predictor: BranchPredictor,

    /// Instructions fetched per cycle
    #[serde(default = "CoreConfig::default_width")]
    pub fetch_width: usize,

    /// Instructions dispatched per cycle
    #[serde(default = "CoreConfig::default_width")]
    pub dispatch_width: usize,

    /// Instructions issued per cycle (shared by all threads)
    #[serde(default = "CoreConfig::default_width")]
    pub issue_width: usize,

    /// Instructions committed per cycle (shared by all threads)
    #[serde(default = "CoreConfig::default_width")]
    pub commit_width: usize,

    /// Hardware thread contexts
    #[serde(default = "CoreConfig::default_threads")]
    pub thread_count: usize,

    /// Reorder buffer entries per thread
    #[serde(default = "CoreConfig::default_rob")]
    pub rob_entries: usize,

    /// Post-commit store buffer entries per thread
    #[serde(default = "CoreConfig::default_store_buffer")]
    pub store_buffer_entries: usize,

    /// Local predictor history table entries (power of two)
    #[serde(default = "CoreConfig::default_history_entries")]
    pub local_history_entries: usize,

    /// Local predictor history length in bits
    #[serde(default = "CoreConfig::default_history_bits")]
    pub local_history_bits: u32,
}

impl CoreConfig {
    /// Returns the default pipeline width.
    const fn default_width() -> usize {
        defaults::PIPELINE_WIDTH
    }

    /// Returns the default thread count.
    const fn default_threads() -> usize {
        1
    }

    /// Returns the default reorder buffer size.
    const fn default_rob() -> usize {
        defaults::ROB_ENTRIES
    }

    /// Returns the default store buffer size.
    const fn default_store_buffer() -> usize {
        defaults::STORE_BUFFER_ENTRIES
    }

    /// Returns the default local history table size.
    const fn default_history_entries() -> usize {
        defaults::LOCAL_HISTORY_ENTRIES
    }

    /// Returns the default local history length.
    const fn default_history_bits() -> u32 {
        defaults::LOCAL_HISTORY_BITS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("fetchWidth", self.fetch_width),
            ("dispatchWidth", self.dispatch_width),
            ("issueWidth", self.issue_width),
            ("commitWidth", self.commit_width),
            ("robEntries", self.rob_entries),
            ("storeBufferEntries", self.store_buffer_entries),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(format!("core.{key} must be at least 1")));
            }
        }
        if self.thread_count == 0 || self.thread_count > MAX_THREADS {
            return Err(ConfigError::invalid(format!(
                "core.threadCount {} must be between 1 and {MAX_THREADS}",
                self.thread_count
            )));
        }
        if self.branch_predictor == BranchPredictor::Local
            && (!self.local_history_entries.is_power_of_two()
                || self.local_history_bits == 0
                || self.local_history_bits > 16)
        {
            return Err(ConfigError::invalid(
                "local predictor needs a power-of-two history table and 1..=16 history bits",
            ));
        }
        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            core_type: CoreType::default(),
            branch_predictor: BranchPredictor::default(),
            fetch_width: defaults::PIPELINE_WIDTH,
            dispatch_width: defaults::PIPELINE_WIDTH,
            issue_width: defaults::PIPELINE_WIDTH,
            commit_width: defaults::PIPELINE_WIDTH,
            thread_count: 1,
            rob_entries: defaults::ROB_ENTRIES,
            store_buffer_entries: defaults::STORE_BUFFER_ENTRIES,
            local_history_entries: defaults::LOCAL_HISTORY_ENTRIES,
            local_history_bits: defaults::LOCAL_HISTORY_BITS,
        }
    }
}

/// System bus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BusConfig {
    /// Cycles a request waits in its port queue before arbitration, and a
    /// response before delivery
    #[serde(default = "BusConfig::default_latency")]
    pub latency: u64,

    /// Requests buffered per port
    #[serde(default = "BusConfig::default_queue_depth")]
    pub queue_depth: usize,
}

impl BusConfig {
    /// Returns the default bus latency.
    const fn default_latency() -> u64 {
        defaults::BUS_LATENCY
    }

    /// Returns the default port queue depth.
    const fn default_queue_depth() -> usize {
        defaults::BUS_QUEUE_DEPTH
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::invalid("bus.queueDepth must be non-zero"));
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            latency: defaults::BUS_LATENCY,
            queue_depth: defaults::BUS_QUEUE_DEPTH,
        }
    }
}

/// Interrupt controller configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InterruptConfig {
    /// PIO window base address
    #[serde(default = "InterruptConfig::default_base")]
    pub base: u64,

    /// PIO access latency in cycles
    #[serde(default = "InterruptConfig::default_latency")]
    pub latency: u64,
}

impl InterruptConfig {
    /// Returns the default PIO base.
    const fn default_base() -> u64 {
        defaults::INTERRUPT_BASE
    }

    /// Returns the default PIO latency.
    const fn default_latency() -> u64 {
        defaults::INTERRUPT_LATENCY
    }
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            base: defaults::INTERRUPT_BASE,
            latency: defaults::INTERRUPT_LATENCY,
        }
    }
}
