use proptest::prelude::*;
use zperiph::addr::Addr;
use zperiph::bus::{
    BankedRam, BankedRamConfig, BusDevice, IntervalTimer, TimerConfig,
};

//===========================================================================//

fn banked_ram(banks: usize) -> BankedRam {
    BankedRam::new(&BankedRamConfig {
        name: "banked_ram".to_string(),
        address: 0x8000,
        size: 0x8000,
        banks,
        bank_select: 0x08,
        padding: Some(0x76),
    })
    .unwrap()
}

fn loaded_timer(count: u16) -> IntervalTimer {
    let mut timer = IntervalTimer::new(&TimerConfig {
        name: "timer".to_string(),
        base_port: 0x10,
        period: 1,
    })
    .unwrap();
    timer.write_control(0b0011_0000).unwrap();
    let [lsb, msb] = count.to_le_bytes();
    timer.write_counter_byte(0, lsb).unwrap();
    timer.write_counter_byte(0, msb).unwrap();
    timer
}

//===========================================================================//

proptest! {
    #[test]
    fn bank_select_tracks_last_write(
        banks in 1usize..=32,
        writes in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let mut ram = banked_ram(banks);
        for &value in writes.iter() {
            ram.write_io(0x08, value).unwrap();
        }
        let last = *writes.last().unwrap();
        prop_assert_eq!(ram.current_bank(), usize::from(last) % banks);
        prop_assert_eq!(ram.bank_history().len(), writes.len());
    }

    #[test]
    fn writes_stay_in_their_bank(
        bank in 0usize..16,
        other in 0usize..16,
        offset in 0u16..0x8000,
        data in any::<u8>(),
    ) {
        prop_assume!(bank != other);
        let mut ram = banked_ram(16);
        let addr = Addr::from(0x8000 + offset);
        ram.write_io(0x08, bank as u8).unwrap();
        ram.write_mem(addr, data);
        prop_assert_eq!(ram.read_mem(addr).unwrap(), Some(data));
        ram.write_io(0x08, other as u8).unwrap();
        prop_assert_eq!(ram.read_mem(addr).unwrap(), Some(0x76));
        ram.write_io(0x08, bank as u8).unwrap();
        prop_assert_eq!(ram.read_mem(addr).unwrap(), Some(data));
    }

    #[test]
    fn timer_output_rises_after_count_plus_two_ticks(
        count in 0u16..2000,
        chunks in prop::collection::vec(1u64..50, 1..100),
    ) {
        let latency = u64::from(count) + 2;
        let mut batched = loaded_timer(count);
        let mut elapsed = 0;
        for &chunk in chunks.iter() {
            batched.clock(chunk);
            elapsed += chunk;
            prop_assert_eq!(batched.out(0), elapsed >= latency);
        }
        let mut single = loaded_timer(count);
        for _ in 0..elapsed {
            single.clock(1);
        }
        prop_assert_eq!(single.out(0), batched.out(0));
        prop_assert_eq!(single.count(0), batched.count(0));
    }
}

//===========================================================================//
