use rand::Rng;
use std::collections::BTreeMap;

pub const GC_COMPACT_ENV: (&str, &str) = ("RUBY_GC_AUTO_COMPACT", "1");

pub const CALL_THRESHOLDS: &[u32] = &[1, 2, 10, 30];
pub const COLD_THRESHOLDS: &[u32] = &[1, 2, 5, 10, 500, 50_000];
pub const MEM_SIZES_MB: &[u32] = &[1, 2, 3, 4, 5, 10, 64, 128];

pub const MEM_SIZE_FLAG: &str = "--yjit-mem-size";
pub const EXEC_MEM_SIZE_FLAG: &str = "--yjit-exec-mem-size";

pub const OPTIONAL_FLAGS: [&str; 4] = [
    "--yjit-code-gc",
    "--yjit-perf",
    "--yjit-stats",
    "--yjit-log=/dev/null",
];

/// Environment and interpreter flags for exactly one benchmark execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RunConfiguration {
    pub env_overrides: BTreeMap<String, String>,
    pub extra_flags: Vec<String>,
}

fn pick<R: Rng + ?Sized>(rng: &mut R, set: &[u32]) -> u32 {
    set[rng.gen_range(0..set.len())]
}

/// Draws a random configuration. With the JIT disabled only the environment
/// is randomized and the flag list stays empty.
pub fn sample<R: Rng + ?Sized>(rng: &mut R, jit_enabled: bool) -> RunConfiguration {
    let mut config = RunConfiguration::default();
    if rng.gen_bool(0.5) {
        config
            .env_overrides
            .insert(GC_COMPACT_ENV.0.to_string(), GC_COMPACT_ENV.1.to_string());
    }
    if !jit_enabled {
        return config;
    }

    let flags = &mut config.extra_flags;
    flags.push(format!("--yjit-call-threshold={}", pick(rng, CALL_THRESHOLDS)));
    flags.push(format!("--yjit-cold-threshold={}", pick(rng, COLD_THRESHOLDS)));

    // Both sides get their own size; only the chosen side is emitted.
    let mem = format!("{}={}", MEM_SIZE_FLAG, pick(rng, MEM_SIZES_MB));
    let exec_mem = format!("{}={}", EXEC_MEM_SIZE_FLAG, pick(rng, MEM_SIZES_MB));
    flags.push(if rng.gen_bool(0.5) { mem } else { exec_mem });

    for flag in OPTIONAL_FLAGS {
        if rng.gen_bool(0.5) {
            flags.push(flag.to_string());
        }
    }
    config
}

/// Every configuration `sample` can produce for the given mode.
pub fn reachable(jit_enabled: bool) -> Vec<RunConfiguration> {
    let envs = [
        BTreeMap::new(),
        BTreeMap::from([(GC_COMPACT_ENV.0.to_string(), GC_COMPACT_ENV.1.to_string())]),
    ];
    if !jit_enabled {
        return envs
            .into_iter()
            .map(|env_overrides| RunConfiguration {
                env_overrides,
                extra_flags: Vec::new(),
            })
            .collect();
    }

    let mut mem_flags = Vec::new();
    for name in [MEM_SIZE_FLAG, EXEC_MEM_SIZE_FLAG] {
        for size in MEM_SIZES_MB {
            mem_flags.push(format!("{}={}", name, size));
        }
    }

    let mut out = Vec::new();
    for env in &envs {
        for call in CALL_THRESHOLDS {
            for cold in COLD_THRESHOLDS {
                for mem in &mem_flags {
                    for mask in 0..(1u32 << OPTIONAL_FLAGS.len()) {
                        let mut extra_flags = vec![
                            format!("--yjit-call-threshold={}", call),
                            format!("--yjit-cold-threshold={}", cold),
                            mem.clone(),
                        ];
                        for (i, flag) in OPTIONAL_FLAGS.iter().enumerate() {
                            if mask & (1 << i) != 0 {
                                extra_flags.push(flag.to_string());
                            }
                        }
                        out.push(RunConfiguration {
                            env_overrides: env.clone(),
                            extra_flags,
                        });
                    }
                }
            }
        }
    }
    out
}
