pub mod btle;

/// Outbound calls to the Bluetooth stack. All of them are fire-and-forget: results arrive, if at
/// all, as `DiscoveryEvent`s on the controller's event channel.
pub trait BluetoothPlatform {
    /// An adapter exists and is powered on.
    fn is_available(&self) -> bool;

    fn supports_low_energy(&self) -> bool;

    /// Start delivering discovery notifications.
    fn register(&mut self);

    /// Stop delivering discovery notifications.
    fn unregister(&mut self);

    fn cancel_discovery(&mut self);

    fn start_classic_discovery(&mut self);

    fn start_low_energy_scan(&mut self);

    fn stop_low_energy_scan(&mut self);
}
