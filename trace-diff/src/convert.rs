//! Converts the raw wire-shaped [`qemu_ipc::Data`] message into the domain
//! [`Trace`] types the filter and diff stages operate on.

use qemu_ipc::Data;

use crate::types::{MemDirection, MemInfo, RegisterSnapshot, TbExec, TbInfo, Trace};

impl From<&Data> for Trace {
    fn from(data: &Data) -> Self {
        let tbinfo = data
            .tb_informations
            .iter()
            .map(|tb| TbInfo {
                id: tb.id,
                size: tb.size,
                ins_count: tb.ins_count,
                num_exec: tb.num_exec,
                assembler: tb.assembler.clone(),
            })
            .collect();

        let tbexec = data
            .tb_exec_orders
            .iter()
            .map(|e| TbExec { tb: e.tb, pos: e.pos })
            .collect();

        let meminfo = data
            .mem_infos
            .iter()
            .map(|m| MemInfo {
                ins_address: m.ins_address,
                tb_id: m.tb_id,
                size: m.size,
                address: m.address,
                direction: if m.direction == 1 {
                    MemDirection::Write
                } else {
                    MemDirection::Read
                },
                counter: m.counter,
            })
            .collect();

        let registers = data
            .register_info
            .as_ref()
            .map(|info| registers_from_wire(info))
            .into_iter()
            .flatten()
            .collect();

        Trace {
            tbinfo,
            tbexec,
            meminfo,
            registers,
        }
    }
}

fn registers_from_wire(info: &qemu_ipc::RegisterInfo) -> Option<RegisterSnapshot> {
    match info.arch_type.as_str() {
        "arm" if info.register_dumps.len() >= 18 => {
            let mut r = [0u64; 16];
            r.copy_from_slice(&info.register_dumps[0..16]);
            Some(RegisterSnapshot::Arm {
                r,
                xpsr: info.register_dumps[16],
                pc: info.register_dumps[17],
                tb_counter: info.register_dumps.get(18).copied().unwrap_or(0),
            })
        }
        "riscv" if info.register_dumps.len() >= 34 => {
            let mut x = [0u64; 32];
            x.copy_from_slice(&info.register_dumps[0..32]);
            Some(RegisterSnapshot::RiscV {
                x,
                pc: info.register_dumps[32],
                tb_counter: info.register_dumps.get(33).copied().unwrap_or(0),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qemu_ipc::{RegisterInfo, TbInformation};

    #[test]
    fn converts_tbinfo_fields_verbatim() {
        let data = Data {
            tb_informations: vec![TbInformation {
                id: 0x1000,
                size: 8,
                ins_count: 2,
                num_exec: 3,
                assembler: "[ 0x1000 ] a".to_string(),
            }],
            ..Default::default()
        };
        let trace = Trace::from(&data);
        assert_eq!(trace.tbinfo.len(), 1);
        assert_eq!(trace.tbinfo[0].id, 0x1000);
    }

    #[test]
    fn arm_registers_decode_with_expected_layout() {
        let dumps: Vec<u64> = (0..19).collect();
        let info = RegisterInfo {
            arch_type: "arm".to_string(),
            register_dumps: dumps,
        };
        let snapshot = registers_from_wire(&info).unwrap();
        match snapshot {
            RegisterSnapshot::Arm { r, xpsr, pc, tb_counter } => {
                assert_eq!(r[0], 0);
                assert_eq!(xpsr, 16);
                assert_eq!(pc, 17);
                assert_eq!(tb_counter, 18);
            }
            _ => panic!("expected arm snapshot"),
        }
    }
}
