use serdes240_pac::device::{Device, DeviceAccess, Result};
use serdes240_pac::register::REGISTER_NAMES;

pub fn registers_dump_raw<A: DeviceAccess>(device: &Device<A>) -> Result<()> {
    let values = device.snapshot()?;
    print!("00:");
    for value in values {
        print!(" {value:02x}");
    }
    println!();

    Ok(())
}

pub fn registers_dump<A: DeviceAccess>(device: &Device<A>) -> Result<()> {
    let values = device.snapshot()?;
    for (address, (name, value)) in REGISTER_NAMES.iter().zip(values).enumerate() {
        println!("{address:02x} {name:<12} {value:02x}");
    }

    println!("\t{:?}", device.phy_enable ().read()?);
    println!("\t{:?}", device.tx_config  ().read()?);
    println!("\t{:?}", device.rx_config  ().read()?);
    println!("\t{:?}", device.data_select().read()?);
    let pll = device.pll_config().read()?;
    println!("\t{:?} (charge pump {} uA)", pll, pll.CP_CURRENT().microamps());
    println!("\t{:?}", device.cdr_config ().read()?);
    println!("\t{:?}", device.status     ().read()?);
    println!("\t{:?}", device.debug      ().read()?);

    Ok(())
}
