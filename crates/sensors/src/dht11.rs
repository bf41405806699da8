//! DHT11 single-wire temperature/humidity probe
//!
//! Frame: 40 bits MSB first, `[hum_int, hum_dec, temp_int, temp_dec, checksum]`.
//! Each bit is a ~50 µs low followed by a high whose width encodes the value
//! (~27 µs -> 0, ~70 µs -> 1).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::environment::ClimateProbe;
use crate::error::{Result, SensorError};
use crate::gpio::{GpioBus, PinMode};

/// High pulses longer than this are a 1 bit
pub const BIT_THRESHOLD: Duration = Duration::from_micros(50);

const START_LOW: Duration = Duration::from_millis(18);
const START_HIGH: Duration = Duration::from_micros(30);
const EDGE_TIMEOUT: Duration = Duration::from_micros(200);
const FRAME_BITS: usize = 40;

/// Pack 40 high-pulse widths into 5 bytes
pub fn pulses_to_frame(widths: &[Duration]) -> Result<[u8; 5]> {
    if widths.len() != FRAME_BITS {
        return Err(SensorError::out_of_range(format!(
            "expected {FRAME_BITS} bits, got {}",
            widths.len()
        )));
    }
    let mut frame = [0u8; 5];
    for (i, width) in widths.iter().enumerate() {
        if *width > BIT_THRESHOLD {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    Ok(frame)
}

/// Validate checksum and convert to (temperature °C, humidity %)
pub fn decode_frame(frame: [u8; 5]) -> Result<(f64, f64)> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::Checksum {
            expected: sum,
            actual: frame[4],
        });
    }
    if frame[..4].iter().all(|b| *b == 0) {
        return Err(SensorError::out_of_range("empty frame"));
    }

    let humidity = f64::from(frame[0]) + f64::from(frame[1]) / 10.0;
    let magnitude = f64::from(frame[2]) + f64::from(frame[3] & 0x7f) / 10.0;
    let temperature = if frame[3] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if !(0.0..=100.0).contains(&humidity) {
        return Err(SensorError::out_of_range(format!("humidity {humidity}")));
    }
    if !(-20.0..=60.0).contains(&temperature) {
        return Err(SensorError::out_of_range(format!("temperature {temperature}")));
    }
    Ok((temperature, humidity))
}

/// Bit-banged DHT11 on one GPIO line
pub struct Dht11<B: GpioBus> {
    bus: Arc<B>,
    pin: u8,
}

impl<B: GpioBus> Dht11<B> {
    pub fn new(bus: Arc<B>, pin: u8) -> Result<Self> {
        bus.configure(pin, PinMode::Input)?;
        Ok(Self { bus, pin })
    }

    fn capture(&self) -> Result<Vec<Duration>> {
        let pin = self.pin;

        // start signal
        self.bus.configure(pin, PinMode::Output)?;
        self.bus.write(pin, false)?;
        thread::sleep(START_LOW);
        self.bus.write(pin, true)?;
        thread::sleep(START_HIGH);
        self.bus.configure(pin, PinMode::Input)?;

        // sensor response: 80 µs low, 80 µs high, then the first bit's low
        self.bus.wait_for_level(pin, false, EDGE_TIMEOUT)?;
        self.bus.wait_for_level(pin, true, EDGE_TIMEOUT)?;
        self.bus.wait_for_level(pin, false, EDGE_TIMEOUT)?;

        let mut widths = Vec::with_capacity(FRAME_BITS);
        for _ in 0..FRAME_BITS {
            let rise = self.bus.wait_for_level(pin, true, EDGE_TIMEOUT)?;
            let fall = self.bus.wait_for_level(pin, false, EDGE_TIMEOUT)?;
            widths.push(fall.saturating_duration_since(rise));
        }
        Ok(widths)
    }
}

impl<B: GpioBus> ClimateProbe for Dht11<B> {
    fn sample(&self) -> Result<(f64, f64)> {
        let widths = self.capture()?;
        decode_frame(pulses_to_frame(&widths)?)
    }

    fn release(&self) {
        self.bus.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::testing::ScriptedBus;

    fn widths_for(frame: [u8; 5]) -> Vec<Duration> {
        (0..40)
            .map(|i| {
                if frame[i / 8] & (0x80 >> (i % 8)) != 0 {
                    Duration::from_micros(70)
                } else {
                    Duration::from_micros(27)
                }
            })
            .collect()
    }

    fn script_frame(bus: &ScriptedBus, pin: u8, frame: [u8; 5]) {
        let mut t = 0;
        for step in [80, 80, 80] {
            t += step;
            bus.push_edge(pin, t);
        }
        for width in widths_for(frame) {
            t += 50;
            bus.push_edge(pin, t);
            t += width.as_micros() as u64;
            bus.push_edge(pin, t);
        }
    }

    #[test]
    fn test_pulses_to_frame() {
        let frame = [45, 0, 23, 4, 72];
        assert_eq!(pulses_to_frame(&widths_for(frame)).unwrap(), frame);
        assert!(pulses_to_frame(&widths_for(frame)[..39]).is_err());
    }

    #[test]
    fn test_decode_frame() {
        let (t, h) = decode_frame([45, 0, 23, 4, 72]).unwrap();
        assert_eq!(h, 45.0);
        assert!((t - 23.4).abs() < 1e-9);

        let (t, _) = decode_frame([40, 0, 5, 0x82, 40 + 5 + 0x82]).unwrap();
        assert!((t + 5.2).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let err = decode_frame([45, 0, 23, 4, 70]).unwrap_err();
        assert!(matches!(err, SensorError::Checksum { expected: 72, actual: 70 }));
    }

    #[test]
    fn test_decode_rejects_empty_and_out_of_range() {
        assert!(decode_frame([0, 0, 0, 0, 0]).is_err());
        assert!(decode_frame([120, 0, 20, 0, 140]).is_err());
        assert!(decode_frame([50, 0, 80, 0, 130]).is_err());
    }

    #[test]
    fn test_sample_from_scripted_line() {
        let bus = Arc::new(ScriptedBus::new());
        let dht = Dht11::new(bus.clone(), 17).unwrap();
        script_frame(&bus, 17, [52, 0, 26, 1, 79]);

        let (t, h) = dht.sample().unwrap();
        assert!((t - 26.1).abs() < 1e-9);
        assert_eq!(h, 52.0);
        assert_eq!(bus.pending_edges(17), 0);
        assert_eq!(bus.mode(17), Some(PinMode::Input));
        assert_eq!(&bus.writes()[..2], &[(17, false), (17, true)]);
    }

    #[test]
    fn test_sample_without_response_fails() {
        let bus = Arc::new(ScriptedBus::new());
        let dht = Dht11::new(bus.clone(), 17).unwrap();
        assert!(matches!(dht.sample(), Err(SensorError::EdgeTimeout { pin: 17, .. })));
    }
}
