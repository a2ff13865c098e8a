use vmi::{InitMode, Register, VcpuId, Vmi, driver::kvm::KvmDriver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // Matches `-qmp tcp:127.0.0.1:4444,server,nowait -gdb tcp::4445`.
    let driver = KvmDriver::new("127.0.0.1:4444", "127.0.0.1:4445")?;
    let vmi = Vmi::new(driver, InitMode::FULL)?;

    let info = vmi.session().driver().info();
    println!("vcpus:       {}", info.vcpu_count);
    println!("detected OS: {:?}", vmi.os());

    vmi.session().pause()?;

    for vcpu in 0..info.vcpu_count {
        let vcpu = VcpuId(vcpu);
        let rip = vmi.session().get_vcpureg(Register::Rip, vcpu)?;
        let cr3 = vmi.session().get_vcpureg(Register::Cr3, vcpu)?;
        println!("vcpu {}: rip={rip:#018x} cr3={cr3:#018x}", vcpu.0);
    }

    vmi.session().resume()?;

    Ok(())
}
