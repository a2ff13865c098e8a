use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use vmi::{
    AccessMode, InitMode, MemoryAccess, Pfn, Register,
    driver::xen::XenDriver,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let name = std::env::args().nth(1).expect("usage: event-watch <domain-name>");
    let domain_id = XenDriver::id_from_name(&name)?;

    let driver = XenDriver::new(domain_id, true)?;
    let mut vmi = vmi::Vmi::new(driver, InitMode::PARTIAL | InitMode::EVENTS)?;

    let terminate_flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, terminate_flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, terminate_flag.clone())?;

    // Trap writes to CR3 (address-space switches) on every vCPU.
    vmi.session_mut().register_reg_event(
        Register::Cr3,
        AccessMode::Mask(MemoryAccess::W),
        Box::new(|vcpu, reg| {
            println!("vcpu {}: {reg:?} write", vcpu.0);
        }),
    )?;

    // Trap execution of the first page of guest physical memory.
    vmi.session_mut().register_mem_event_page(
        Pfn::new(0),
        AccessMode::Mask(MemoryAccess::X),
        Box::new(|vcpu, pfn, offset, access| {
            println!("vcpu {}: exec at pfn={pfn:?} offset={offset:?} access={access:?}");
        }),
    )?;

    println!("listening for events, press Ctrl-C to stop");

    while !terminate_flag.load(Ordering::SeqCst) {
        vmi.session_mut().events_listen(100)?;
    }

    vmi.session_mut().clear_mem_event_page(Pfn::new(0))?;
    vmi.session_mut().clear_reg_event(Register::Cr3)?;
    vmi.destroy()?;

    Ok(())
}
