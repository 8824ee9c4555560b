#![no_std]
#![no_main]

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_time::Ticker;
use flight_core::{
    Actuation, FlightMode, FlightSupervisor, Notification, Vehicle, DEFAULT_SUPERVISOR_CONFIG,
};
use flight_rp2040::{
    BusNotifier, FlightVehicle, NotificationBus, NotificationSubscriber, SignalDeadline,
    UartFrameSource, FLIGHT_TABLE,
};
use spektrum_proto::{ReceiverBridge, SatelliteReceiver, SPEKTRUM_BAUDRATE};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
});

/// Mailbox deadline, serviced by the expiry task.
static DEADLINE: SignalDeadline = SignalDeadline::new();

/// Mode and setpoint-validity notifications.
static BUS: NotificationBus = NotificationBus::new();

static VEHICLE: StaticCell<FlightVehicle> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Flight front end starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    let vehicle: &'static FlightVehicle =
        VEHICLE.init(Vehicle::new(&DEADLINE, BusNotifier::new(&BUS), FLIGHT_TABLE));

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = SPEKTRUM_BAUDRATE;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (_tx, rx) = uart.split();
    let source = UartFrameSource::new(rx);

    // On-board LED on Pico
    let led = Output::new(p.PIN_25, Level::Low);

    // Subscribe before start() so the initial modes are seen.
    let status = match BUS.subscriber() {
        Ok(sub) => sub,
        Err(e) => {
            error!("Notification bus full: {:?}", e);
            return;
        }
    };

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(status_task(status, led).unwrap());
    spawner.spawn(expiry_task(vehicle).unwrap());
    spawner.spawn(control_task(vehicle).unwrap());
    spawner.spawn(receiver_task(source, vehicle).unwrap());

    vehicle.start();
    info!("Flight front end initialized, waiting for receiver...");
}

/// Receiver task - reads satellite frames and feeds the vehicle.
#[embassy_executor::task]
async fn receiver_task(source: UartFrameSource<'static>, vehicle: &'static FlightVehicle) {
    let mut bridge = ReceiverBridge::new(source, SatelliteReceiver::default());
    bridge.run(vehicle).await
}

/// Control task - runs the flight supervisor at the control rate.
#[embassy_executor::task]
async fn control_task(vehicle: &'static FlightVehicle) {
    let mut supervisor = FlightSupervisor::new(DEFAULT_SUPERVISOR_CONFIG);
    let mut ticker = Ticker::every(supervisor.config().tick);
    let mut last = Actuation::Disabled;

    loop {
        ticker.next().await;
        let actuation = supervisor.tick(vehicle);
        if !same_stage(&last, &actuation) {
            info!("Actuation: {:?}", actuation);
        }
        last = actuation;
    }
}

fn same_stage(a: &Actuation, b: &Actuation) -> bool {
    matches!(
        (a, b),
        (Actuation::Disabled, Actuation::Disabled)
            | (Actuation::Idle, Actuation::Idle)
            | (Actuation::Track { .. }, Actuation::Track { .. })
    )
}

/// Expiry task - clears the mailbox when its deadline passes.
#[embassy_executor::task]
async fn expiry_task(vehicle: &'static FlightVehicle) {
    loop {
        let deadline = DEADLINE.wait_expired().await;
        vehicle.setpoint_expired(deadline);
    }
}

/// Status task - follows notifications and drives the LED.
#[embassy_executor::task]
async fn status_task(mut notifications: NotificationSubscriber, mut led: Output<'static>) {
    loop {
        match notifications.next_message_pure().await {
            Notification::FlightMode(mode) => {
                info!("Flight mode: {:?}", mode);
                match mode {
                    FlightMode::Arming | FlightMode::Armed => led.set_high(),
                    FlightMode::Fault => {
                        error!("Vehicle faulted");
                        led.set_low();
                    }
                    _ => led.set_low(),
                }
            }
            Notification::ControlMode(mode) => info!("Control mode: {:?}", mode),
            Notification::SetpointValid(true) => info!("Setpoint stream up"),
            Notification::SetpointValid(false) => warn!("Setpoint stream lost"),
        }
    }
}
