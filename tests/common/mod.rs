use std::cmp::Ordering;
use std::collections::HashMap;

use tinyback::ir::{Address, AddressingMode, Function, Imm, Instruction, Mnemonic, RightOperand, VReg};
use tinyback::regalloc::PhysReg;

/// Initial value of both `FP` and `SP`.
pub(crate) const FRAME_BASE: i64 = 1000;

const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RegKey {
    Virtual(u32),
    Phys(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Cell {
    Addr(i64),
    Symbol(String),
}

enum Operand {
    Value(i64),
    Cell(Cell),
}

/// Observable effects of one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RunResult {
    /// Values written by `out`, in order.
    pub(crate) output: Vec<i64>,
    /// Final contents of every named memory cell.
    pub(crate) symbols: Vec<(String, i64)>,
}

/// Executes a function on a word-addressed model of the machine.
///
/// Registers are keyed by their assigned physical register when there is one and by their
/// virtual register otherwise, so the same interpreter runs a function before and after
/// allocation. Parameters are placed below `FP` the way a caller pushes them.
pub(crate) fn run_function(func: &Function, params: &[i64]) -> RunResult {
    let mut machine = Machine::new();
    let count = params.len() as i64;
    for (i, value) in params.iter().enumerate() {
        let offset = -(1 + count - i as i64);
        machine.memory.insert(Cell::Addr(FRAME_BASE + offset), *value);
    }

    let labels = func.label_positions();
    let mut pc = 0;
    let mut steps = 0;
    while pc < func.insts.len() {
        steps += 1;
        assert!(steps < STEP_LIMIT, "{} did not terminate", func.name);

        let Instruction::Normal(inst) = &func.insts[pc] else {
            pc += 1;
            continue;
        };
        pc += 1;

        let left = machine.key(func, inst.left);
        let right = inst.right.as_ref();
        match &inst.mnemonic {
            Mnemonic::Load => {
                let value = machine.read_right(func, right);
                machine.set(left, value);
            }
            Mnemonic::Store => {
                let value = machine.get(left);
                let Some(Operand::Cell(cell)) = right.map(|r| machine.operand(func, r)) else {
                    panic!("store needs a memory operand");
                };
                machine.memory.insert(cell, value);
            }
            Mnemonic::Add | Mnemonic::Sub | Mnemonic::Mul => {
                let a = machine.get(left);
                let b = machine.read_right(func, right);
                let value = match inst.mnemonic {
                    Mnemonic::Add => a.wrapping_add(b),
                    Mnemonic::Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                };
                machine.set(left, value);
            }
            Mnemonic::Not => {
                let value = !machine.get(left);
                machine.set(left, value);
            }
            Mnemonic::Comp => {
                let a = machine.get(left);
                let b = machine.read_right(func, right);
                machine.state = a.cmp(&b);
            }
            Mnemonic::Out => {
                let value = machine.get(left);
                machine.output.push(value);
            }
            Mnemonic::Push => {
                let value = machine.read_right(func, right);
                let sp = machine.get(left) + 1;
                machine.set(left, sp);
                machine.memory.insert(Cell::Addr(sp), value);
            }
            Mnemonic::Pop => {
                let sp = machine.get(left);
                let value = machine.load(&Cell::Addr(sp));
                machine.set(left, sp - 1);
                let target = right
                    .and_then(|r| r.addr.reg())
                    .map(|reg| machine.key(func, reg))
                    .expect("pop needs a register operand");
                machine.set(target, value);
            }
            Mnemonic::Call => {
                // External routine: it saves the return address and `FP` above `SP`
                // and leaves `SP` where it found it.
                let sp = machine.get(left);
                machine.memory.insert(Cell::Addr(sp + 1), pc as i64);
                machine.memory.insert(Cell::Addr(sp + 2), FRAME_BASE);
            }
            Mnemonic::Nop => {}
            m if m.is_jump() => {
                let value = machine.get(left);
                let taken = match m {
                    Mnemonic::Jump => true,
                    Mnemonic::Jzer => value == 0,
                    Mnemonic::Jnzer => value != 0,
                    Mnemonic::Jpos => value > 0,
                    Mnemonic::Jnpos => value <= 0,
                    Mnemonic::Jneg => value < 0,
                    Mnemonic::Jnneg => value >= 0,
                    Mnemonic::Jles => machine.state == Ordering::Less,
                    Mnemonic::Jequ => machine.state == Ordering::Equal,
                    Mnemonic::Jgre => machine.state == Ordering::Greater,
                    Mnemonic::Jnles => machine.state != Ordering::Less,
                    Mnemonic::Jnequ => machine.state != Ordering::Equal,
                    Mnemonic::Jngre => machine.state != Ordering::Greater,
                    other => panic!("unsupported jump {}", other),
                };
                if taken {
                    let target = inst.jump_target().expect("jump without a target");
                    pc = labels[target];
                }
            }
            other => panic!("unsupported instruction {}", other),
        }
    }

    let mut symbols: Vec<(String, i64)> = machine
        .memory
        .iter()
        .filter_map(|(cell, value)| match cell {
            Cell::Symbol(name) => Some((name.clone(), *value)),
            Cell::Addr(_) => None,
        })
        .collect();
    symbols.sort();

    RunResult {
        output: machine.output,
        symbols,
    }
}

struct Machine {
    regs: HashMap<RegKey, i64>,
    memory: HashMap<Cell, i64>,
    state: Ordering,
    output: Vec<i64>,
}

impl Machine {
    fn new() -> Self {
        let mut regs = HashMap::new();
        regs.insert(RegKey::Phys(PhysReg::SP.number()), FRAME_BASE);
        regs.insert(RegKey::Phys(PhysReg::FP.number()), FRAME_BASE);
        Machine {
            regs,
            memory: HashMap::new(),
            state: Ordering::Equal,
            output: Vec::new(),
        }
    }

    fn key(&self, func: &Function, reg: VReg) -> RegKey {
        match func.info(reg).assigned {
            Some(phys) => RegKey::Phys(phys.number()),
            None => RegKey::Virtual(reg.id()),
        }
    }

    fn get(&self, key: RegKey) -> i64 {
        self.regs.get(&key).copied().unwrap_or(0)
    }

    fn set(&mut self, key: RegKey, value: i64) {
        self.regs.insert(key, value);
    }

    fn load(&self, cell: &Cell) -> i64 {
        self.memory.get(cell).copied().unwrap_or(0)
    }

    fn operand(&self, func: &Function, right: &RightOperand) -> Operand {
        let int = |imm: &Imm| match imm {
            Imm::Int(value) => *value,
            Imm::Symbol(name) => panic!("symbol {} used as a number", name),
        };
        let direct = match &right.addr {
            Address::Reg(reg) => Operand::Value(self.get(self.key(func, *reg))),
            Address::Imm(Imm::Symbol(name)) if right.mode != AddressingMode::Immediate => {
                Operand::Cell(Cell::Symbol(name.clone()))
            }
            Address::Imm(imm) => Operand::Cell(Cell::Addr(int(imm))),
            Address::Indexed(imm, reg) => {
                Operand::Cell(Cell::Addr(int(imm) + self.get(self.key(func, *reg))))
            }
        };
        match right.mode {
            AddressingMode::Immediate => match (&right.addr, direct) {
                (Address::Reg(_), value) => value,
                (_, Operand::Cell(Cell::Addr(addr))) => Operand::Value(addr),
                _ => panic!("unsupported immediate operand"),
            },
            AddressingMode::Direct => direct,
            AddressingMode::Indirect => match direct {
                Operand::Value(addr) => Operand::Cell(Cell::Addr(addr)),
                Operand::Cell(cell) => Operand::Cell(Cell::Addr(self.load(&cell))),
            },
        }
    }

    fn read_right(&self, func: &Function, right: Option<&RightOperand>) -> i64 {
        let right = right.expect("missing right operand");
        match self.operand(func, right) {
            Operand::Value(value) => value,
            Operand::Cell(cell) => self.load(&cell),
        }
    }
}
