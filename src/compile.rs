use log::{debug, warn};

use crate::diag::{CompileError, InternalError};
use crate::emit::{AsmWriter, TextWriter, TextWriterConfig, emit_function};
use crate::frame::Frame;
use crate::ir::Function;
use crate::listing::{ListedFunction, parse_listing};
use crate::opt::optimize;
use crate::regalloc::liveness::{self, format_live_ranges};
use crate::regalloc::{AllocMapDisplay, AllocationResult, LinearScan, insert_spill_code};

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Comma-separated stages to dump: opt,liveness,regalloc,asm
    pub dump: Option<String>,
    pub lower: LowerOptions,
    pub writer: TextWriterConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct LowerOptions {
    pub optimize: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DumpFlags {
    pub opt: bool,
    pub liveness: bool,
    pub regalloc: bool,
    pub asm: bool,
}

impl DumpFlags {
    pub fn parse(dump: Option<&str>) -> Self {
        let mut flags = DumpFlags::default();
        let Some(dump) = dump else {
            return flags;
        };
        for item in dump.split(',').map(|s| s.trim().to_lowercase()) {
            match item.as_str() {
                "opt" => flags.opt = true,
                "liveness" => flags.liveness = true,
                "regalloc" => flags.regalloc = true,
                "asm" => flags.asm = true,
                "" => {}
                _ => warn!("unknown dump flag: {item}"),
            }
        }
        flags
    }
}

/// A function whose every operand names a physical register.
#[derive(Debug)]
pub struct LoweredFunction {
    pub func: Function,
    pub frame: Frame,
    pub alloc: AllocationResult,
}

/// Optimize, allocate and rewrite one function, then reserve its frame.
pub fn lower_function(
    mut func: Function,
    mut frame: Frame,
    opts: &LowerOptions,
    dump: &DumpFlags,
) -> Result<LoweredFunction, InternalError> {
    // --- Optimize ---

    if opts.optimize {
        optimize(&mut func);
        if dump.opt {
            println!("Optimized ({}):", func.name);
            println!("--------------------------------");
            print!("{}", func);
            println!("--------------------------------");
        }
    }

    // --- Live ranges ---

    let events = liveness::analyze(&mut func);
    if dump.liveness {
        print!("{}", format_live_ranges(&func));
    }

    // --- Allocate ---

    let alloc = LinearScan::new(&mut func).alloc(&events)?;
    frame.reserve_spill_locations(alloc.spill_slots);
    if dump.regalloc {
        println!("Register Allocation ({}):", func.name);
        println!("--------------------------------");
        println!("{}", AllocMapDisplay(&func));
        println!("--------------------------------");
    }
    debug!(
        "{}: {} spill slot(s), frame size {}",
        func.name,
        alloc.spill_slots,
        frame.size()
    );

    // --- Spill code ---

    insert_spill_code(&mut func, &frame)?;

    // --- Frame ---

    frame.insert_frame_code(&mut func);

    Ok(LoweredFunction { func, frame, alloc })
}

/// Lower every function of a listing and return the assembly text.
pub fn compile(source: &str, opts: &CompileOptions) -> Result<String, CompileError> {
    let dump = DumpFlags::parse(opts.dump.as_deref());
    let listed = parse_listing(source)?;

    let mut writer = TextWriter::new(Vec::new(), opts.writer);
    for ListedFunction {
        func,
        params,
        locals,
    } in listed
    {
        let name = func.name.clone();
        let mut frame = Frame::new(params);
        if locals > 0 {
            frame.reserve_local(locals);
        }
        let lowered = lower_function(func, frame, &opts.lower, &dump)
            .map_err(|e| CompileError::Lower(name.clone(), e))?;

        writer.add_label(&name)?;
        emit_function(&lowered.func, &mut writer)?;
    }
    writer.finish()?;

    let asm = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    if dump.asm {
        println!("Assembly:");
        println!("--------------------------------");
        print!("{}", asm);
        println!("--------------------------------");
    }
    Ok(asm)
}

#[cfg(test)]
#[path = "tests/t_compile.rs"]
mod tests;
