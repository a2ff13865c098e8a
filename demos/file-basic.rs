use vmi::{AccessContext, InitMode, Pa, Va, VcpuId, Vmi, driver::file::FileDriver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let path = std::env::args().nth(1).expect("usage: file-basic <snapshot-path> [page-table-root-hex]");

    let driver = FileDriver::new(&path)?;
    let vmi = Vmi::new(driver, InitMode::FULL)?;

    let info = vmi.session().driver().info();
    println!("address width: {:?}", info.address_width);
    println!("memory size:   {} bytes", info.memory_size);
    println!("detected OS:   {:?}", vmi.os());

    // No live vCPU state in a snapshot, so walk the page tables with an
    // explicit root rather than letting `read` fall back to the current one.
    if let Some(root) = std::env::args().nth(2) {
        let root = Pa(u64::from_str_radix(root.trim_start_matches("0x"), 16)?);

        let mut buf = [0u8; 16];
        vmi.read(
            AccessContext::paging(Va(0xffff_ffff_8000_0000), root),
            VcpuId(0),
            &mut buf,
        )?;
        println!("bytes at kernel base: {buf:02x?}");
    }

    Ok(())
}
