//! In-process event kernel implementing [`SimIf`] for a behavioral [`Circuit`].
//!
//! Each time slot runs timer callbacks, then delta cycles until nothing
//! changes, then read-write callbacks (which may start more deltas) and finally
//! one read-only callback.
//!
//! Within a delta, testbench writes and circuit drives from the previous delta
//! are applied, the circuit is evaluated and value-change callbacks fire. The
//! circuit's new drives only land in the next delta, so a coroutine woken by an
//! edge still sees the outputs from before that edge. Values settled by the
//! edge are visible in the read-only phase.

use intmap::IntMap;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::report::RegressionReport;
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{self, format_log_line, SimIf};
use crate::test::RstbTests;
use crate::trigger::{self, EdgeKind};
use crate::TbConfig;

const MAX_DELTAS: u32 = 1000;
const ROOT: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub width: u32,
    pub direction: Direction,
}

impl Port {
    pub fn input(name: &str, width: u32) -> Self {
        Port {
            name: name.to_string(),
            width,
            direction: Direction::Input,
        }
    }
    pub fn output(name: &str, width: u32) -> Self {
        Port {
            name: name.to_string(),
            width,
            direction: Direction::Output,
        }
    }
}

/// Behavior of the circuit hosted by the kernel.
pub trait Circuit {
    fn ports(&self) -> Vec<Port>;
    /// Called after any port changed. Drives land in the next delta cycle.
    fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()>;
}

/// Port access handed to [`Circuit::eval`].
pub struct Pins<'a> {
    nets: &'a [Net],
    ports: &'a HashMap<String, usize>,
    drives: Vec<(usize, u32)>,
}

impl Pins<'_> {
    pub fn get(&self, port: &str) -> SimResult<u32> {
        self.port(port).map(|h| self.nets[h].value)
    }

    pub fn bit(&self, port: &str, index: u32) -> SimResult<bool> {
        let h = self.port(port)?;
        match index < self.nets[h].width {
            true => Ok((self.nets[h].value >> index) & 1 == 1),
            false => Err(SimError::IndexOutOfRange {
                name: port.to_string(),
                index,
            }),
        }
    }

    pub fn drive(&mut self, port: &str, value: u32) -> SimResult<()> {
        let h = self.port(port)?;
        let nets = self.nets;
        let net = &nets[h];
        match net.kind {
            NetKind::Port(Direction::Output) => {
                self.drives.push((h, value & mask(net.width)));
                Ok(())
            }
            _ => Err(SimError::NotWritable(net.name.clone())),
        }
    }

    fn port(&self, port: &str) -> SimResult<usize> {
        self.ports
            .get(port)
            .copied()
            .ok_or_else(|| SimError::NoSuchObject(port.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NetKind {
    Scope,
    Port(Direction),
    Bit { parent: usize, index: u32 },
}

#[derive(Clone, Debug)]
struct Net {
    name: String,
    width: u32,
    value: u32,
    kind: NetKind,
}

#[derive(Clone, Copy, Debug)]
enum CbKind {
    Time(u64),
    Edge,
    Rw,
    Ro,
}

struct Kernel {
    precision: i8,
    time: u64,
    time_limit: Option<u64>,
    nets: Vec<Net>,
    by_name: HashMap<String, usize>,
    ports: HashMap<String, usize>,
    pending: Vec<(usize, u32)>,
    next_cb: usize,
    callbacks: IntMap<CbKind>,
    timers: BTreeMap<u64, Vec<usize>>,
    // callback handle -> watched object
    edges: BTreeMap<usize, usize>,
    rw: Option<usize>,
    ro: Option<usize>,
    read_only: bool,
    finished: bool,
    echo: bool,
    transcript: Vec<String>,
}

impl Kernel {
    fn net(&self, handle: usize) -> SimResult<&Net> {
        self.nets
            .get(handle)
            .ok_or_else(|| SimError::NoSuchObject(format!("<handle {}>", handle)))
    }

    fn value_of(&self, handle: usize) -> u32 {
        match self.nets.get(handle) {
            Some(Net {
                kind: NetKind::Bit { parent, index },
                ..
            }) => (self.nets[*parent].value >> index) & 1,
            Some(net) => net.value,
            None => 0,
        }
    }

    // value the net will have after the pending writes land
    fn pending_value(&self, handle: usize) -> u32 {
        self.pending
            .iter()
            .rev()
            .find(|(h, _)| *h == handle)
            .map(|(_, v)| *v)
            .unwrap_or(self.nets[handle].value)
    }

    fn deposit(&mut self, handle: usize, value: u32) {
        match self.pending.iter_mut().find(|(h, _)| *h == handle) {
            Some(slot) => slot.1 = value,
            None => self.pending.push((handle, value)),
        }
    }

    fn new_callback(&mut self, kind: CbKind) -> usize {
        let handle = self.next_cb;
        self.next_cb += 1;
        self.callbacks.insert(handle as u64, kind);
        handle
    }

    fn object(&self, handle: usize) -> SimObject {
        let kind = match self.nets[handle].kind {
            NetKind::Scope => ObjectKind::Hier,
            _ => ObjectKind::Int(self.nets[handle].width),
        };
        SimObject::new(handle, kind)
    }

    fn bit_select(&mut self, parent: usize, index: u32) -> SimResult<usize> {
        let net = self.net(parent)?;
        if !matches!(net.kind, NetKind::Port(_)) || index >= net.width {
            return Err(SimError::IndexOutOfRange {
                name: net.name.clone(),
                index,
            });
        }
        let name = format!("{}[{}]", net.name, index);
        if let Some(h) = self.by_name.get(&name) {
            return Ok(*h);
        }
        let h = self.nets.len();
        self.nets.push(Net {
            name: name.clone(),
            width: 1,
            value: 0,
            kind: NetKind::Bit { parent, index },
        });
        self.by_name.insert(name, h);
        Ok(h)
    }
}

fn mask(width: u32) -> u32 {
    match width {
        32.. => u32::MAX,
        w => (1 << w) - 1,
    }
}

fn edge_of(width: u32, value: u32) -> EdgeKind {
    match (width, value) {
        (1, 0) => EdgeKind::Falling,
        (1, _) => EdgeKind::Rising,
        _ => EdgeKind::Any,
    }
}

struct Model {
    kernel: RefCell<Kernel>,
    circuit: RefCell<Box<dyn Circuit>>,
}

impl Model {
    fn settle(&self) -> SimResult<()> {
        let mut deltas = 0;
        loop {
            if !self.delta()? {
                let rw = self.take_phase(|k| k.rw.take());
                if rw.is_none() {
                    break;
                }
                trigger::react_rw();
            }
            deltas += 1;
            if deltas > MAX_DELTAS {
                return Err(SimError::DeltaOverflow(MAX_DELTAS));
            }
        }
        if self.take_phase(|k| k.ro.take()).is_some() {
            self.kernel.borrow_mut().read_only = true;
            trigger::react_ro();
            self.kernel.borrow_mut().read_only = false;
        }
        Ok(())
    }

    fn take_phase(&self, take: impl FnOnce(&mut Kernel) -> Option<usize>) -> Option<usize> {
        let mut k = self.kernel.borrow_mut();
        let handle = take(&mut *k)?;
        k.callbacks.remove(handle as u64);
        Some(handle)
    }

    // Returns false when there was nothing to apply.
    fn delta(&self) -> SimResult<bool> {
        let (changed, fired) = {
            let mut k = self.kernel.borrow_mut();
            if k.pending.is_empty() {
                return Ok(false);
            }
            let watched: Vec<(usize, usize, u32)> = k
                .edges
                .iter()
                .map(|(&cb, &sig)| (cb, sig, k.value_of(sig)))
                .collect();
            let mut changed = false;
            for (h, v) in std::mem::take(&mut k.pending) {
                if k.nets[h].value != v {
                    k.nets[h].value = v;
                    changed = true;
                }
            }
            let fired: Vec<(usize, usize, EdgeKind)> = watched
                .into_iter()
                .filter_map(|(cb, sig, before)| {
                    let after = k.value_of(sig);
                    (after != before).then(|| (cb, sig, edge_of(k.nets[sig].width, after)))
                })
                .collect();
            (changed, fired)
        };
        if changed {
            self.eval()?;
        }
        for (cb, sig, edge) in fired {
            // an earlier waiter may have cancelled it
            if self.kernel.borrow().edges.contains_key(&cb) {
                trigger::react_edge(sig, edge);
            }
        }
        Ok(true)
    }

    // the circuit may call back into the simulator, so no kernel borrow is
    // held while it runs
    fn eval(&self) -> SimResult<()> {
        let (nets, ports) = {
            let k = self.kernel.borrow();
            (k.nets.clone(), k.ports.clone())
        };
        let mut pins = Pins {
            nets: &nets,
            ports: &ports,
            drives: Vec::new(),
        };
        self.circuit.borrow_mut().eval(&mut pins)?;
        let drives = pins.drives;
        self.kernel.borrow_mut().pending.extend(drives);
        Ok(())
    }

    fn fire_timers(&self, t: u64) {
        let fired = {
            let mut k = self.kernel.borrow_mut();
            k.time = t;
            let cbs = k.timers.remove(&t).unwrap_or_default();
            for cb in &cbs {
                k.callbacks.remove(*cb as u64);
            }
            !cbs.is_empty()
        };
        if fired {
            trigger::react_time(t);
        }
    }
}

impl SimIf for Model {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimResult<()> {
        let mut k = self.kernel.borrow_mut();
        if k.read_only {
            return Err(SimError::ReadOnlyPhase);
        }
        let (kind, width) = {
            let net = k.net(obj.handle)?;
            (net.kind, net.width)
        };
        match kind {
            NetKind::Port(Direction::Input) => {
                k.deposit(obj.handle, value & mask(width));
                Ok(())
            }
            NetKind::Bit { parent, index }
                if k.nets[parent].kind == NetKind::Port(Direction::Input) =>
            {
                let base = k.pending_value(parent);
                let value = (base & !(1 << index)) | ((value & 1) << index);
                k.deposit(parent, value);
                Ok(())
            }
            _ => Err(SimError::NotWritable(k.nets[obj.handle].name.clone())),
        }
    }

    fn set_value_bin(&self, obj: &SimObject, value: &str) -> SimResult<()> {
        // two-state kernel: x and z read as 0
        let parsed = value.chars().fold(0u32, |acc, c| (acc << 1) | u32::from(c == '1'));
        self.set_value(obj, parsed)
    }

    fn get_value(&self, obj: &SimObject) -> SimResult<u32> {
        let k = self.kernel.borrow();
        k.net(obj.handle)?;
        Ok(k.value_of(obj.handle))
    }

    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String> {
        let k = self.kernel.borrow();
        let width = k.net(obj.handle)?.width as usize;
        Ok(format!("{:0width$b}", k.value_of(obj.handle), width = width))
    }

    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject> {
        let mut k = self.kernel.borrow_mut();
        if let Some(h) = k.by_name.get(name).copied() {
            return Ok(k.object(h));
        }
        // "tb.ui_in[3]"
        let select = name
            .strip_suffix(']')
            .and_then(|n| n.rsplit_once('['))
            .and_then(|(base, idx)| Some((k.by_name.get(base).copied()?, idx.parse().ok()?)));
        match select {
            Some((parent, index)) => {
                let h = k.bit_select(parent, index)?;
                Ok(k.object(h))
            }
            None => Err(SimError::NoSuchObject(name.to_string())),
        }
    }

    fn get_object_by_index(&self, parent: &SimObject, index: u32) -> SimResult<SimObject> {
        let mut k = self.kernel.borrow_mut();
        let h = k.bit_select(parent.handle, index)?;
        Ok(k.object(h))
    }

    fn get_full_name(&self, obj: &SimObject) -> SimResult<String> {
        Ok(self.kernel.borrow().net(obj.handle)?.name.clone())
    }

    fn get_root_object(&self) -> SimResult<SimObject> {
        Ok(self.kernel.borrow().object(ROOT))
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.kernel.borrow().time
    }

    fn get_sim_precision(&self) -> i8 {
        self.kernel.borrow().precision
    }

    fn log(&self, msg: &str) {
        let line = format_log_line(self.get_sim_time_ns(), msg);
        let mut k = self.kernel.borrow_mut();
        if k.echo {
            println!("{}", line);
        }
        k.transcript.push(line);
    }

    fn register_callback_rw(&self) -> SimResult<usize> {
        let mut k = self.kernel.borrow_mut();
        let h = k.new_callback(CbKind::Rw);
        k.rw = Some(h);
        Ok(h)
    }

    fn register_callback_ro(&self) -> SimResult<usize> {
        let mut k = self.kernel.borrow_mut();
        let h = k.new_callback(CbKind::Ro);
        k.ro = Some(h);
        Ok(h)
    }

    fn register_callback_time(&self, t: u64) -> SimResult<usize> {
        let mut k = self.kernel.borrow_mut();
        let t_abs = k.time + t;
        let h = k.new_callback(CbKind::Time(t_abs));
        k.timers.entry(t_abs).or_default().push(h);
        Ok(h)
    }

    fn register_callback_edge(&self, sig_hdl: usize) -> SimResult<usize> {
        let mut k = self.kernel.borrow_mut();
        if k.net(sig_hdl)?.kind == NetKind::Scope {
            return Err(SimError::NoValue(k.nets[sig_hdl].name.clone()));
        }
        let h = k.new_callback(CbKind::Edge);
        k.edges.insert(h, sig_hdl);
        Ok(h)
    }

    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()> {
        let mut k = self.kernel.borrow_mut();
        let kind = k
            .callbacks
            .remove(cb_hdl as u64)
            .ok_or(SimError::UnknownCallback(cb_hdl))?;
        match kind {
            CbKind::Time(t_abs) => {
                if let Some(cbs) = k.timers.get_mut(&t_abs) {
                    cbs.retain(|h| *h != cb_hdl);
                    if cbs.is_empty() {
                        k.timers.remove(&t_abs);
                    }
                }
            }
            CbKind::Edge => {
                k.edges.remove(&cb_hdl);
            }
            CbKind::Rw => {
                k.rw = k.rw.filter(|h| *h != cb_hdl);
            }
            CbKind::Ro => {
                k.ro = k.ro.filter(|h| *h != cb_hdl);
            }
        }
        Ok(())
    }

    fn finish(&self) {
        self.kernel.borrow_mut().finished = true;
    }
}

/// Runs test coroutines against a [`Circuit`] on the current thread.
///
/// ```ignore
/// let sim = ModelSim::new("tb", MyLatch::default())?;
/// let report = sim.run(test_list![test_dlatch], TbConfig::new("dlatch"))?;
/// assert!(report.all_passed());
/// ```
pub struct ModelSim {
    model: Rc<Model>,
}

impl ModelSim {
    /// Builds the object tree `top.<port>` from the circuit's ports.
    pub fn new(top: &str, circuit: impl Circuit + 'static) -> SimResult<Self> {
        if top.is_empty() || top.contains(['.', '[', ']']) {
            return Err(SimError::Circuit(format!("invalid top name '{}'", top)));
        }
        let mut nets = vec![Net {
            name: top.to_string(),
            width: 0,
            value: 0,
            kind: NetKind::Scope,
        }];
        let mut by_name = HashMap::new();
        let mut ports = HashMap::new();
        by_name.insert(top.to_string(), ROOT);
        for port in circuit.ports() {
            if !(1..=32).contains(&port.width) {
                return Err(SimError::Circuit(format!(
                    "port '{}' has unsupported width {}",
                    port.name, port.width
                )));
            }
            if port.name.is_empty() || port.name.contains(['.', '[', ']']) {
                return Err(SimError::Circuit(format!("invalid port name '{}'", port.name)));
            }
            if ports.contains_key(&port.name) {
                return Err(SimError::Circuit(format!("duplicate port '{}'", port.name)));
            }
            let full_name = format!("{}.{}", top, port.name);
            ports.insert(port.name.clone(), nets.len());
            by_name.insert(full_name.clone(), nets.len());
            nets.push(Net {
                name: full_name,
                width: port.width,
                value: 0,
                kind: NetKind::Port(port.direction),
            });
        }
        let kernel = Kernel {
            precision: -9,
            time: 0,
            time_limit: None,
            nets,
            by_name,
            ports,
            pending: Vec::new(),
            next_cb: 1,
            callbacks: IntMap::new(),
            timers: BTreeMap::new(),
            edges: BTreeMap::new(),
            rw: None,
            ro: None,
            read_only: false,
            finished: false,
            echo: true,
            transcript: Vec::new(),
        };
        Ok(ModelSim {
            model: Rc::new(Model {
                kernel: RefCell::new(kernel),
                circuit: RefCell::new(Box::new(circuit)),
            }),
        })
    }

    /// Simulation precision as a power of ten of seconds, `-9` by default.
    pub fn with_precision(self, precision: i8) -> Self {
        self.model.kernel.borrow_mut().precision = precision;
        self
    }

    /// Stops the simulation once time would pass `time`.
    pub fn with_time_limit(self, time: u64, unit: &str) -> SimResult<Self> {
        let steps = {
            let k = self.model.kernel.borrow();
            sim_if::to_sim_steps(time as f64, unit, k.precision)?
        };
        self.model.kernel.borrow_mut().time_limit = Some(steps);
        Ok(self)
    }

    /// Keep log lines in the transcript only.
    pub fn quiet(self) -> Self {
        self.model.kernel.borrow_mut().echo = false;
        self
    }

    pub fn run(&self, tests: RstbTests, config: TbConfig) -> SimResult<RegressionReport> {
        sim_if::install(self.model.clone());
        crate::register_regression(tests, config);
        let outcome = self.simulate();
        let report = crate::end_of_simulation();
        sim_if::uninstall();
        outcome?;
        report.ok_or_else(|| SimError::Simulator("no regression was registered".to_string()))
    }

    fn simulate(&self) -> SimResult<()> {
        let model = &self.model;
        // initial values
        model.eval()?;
        crate::start_of_simulation();
        loop {
            model.settle()?;
            let (next, limit, finished) = {
                let k = model.kernel.borrow();
                (k.timers.keys().next().copied(), k.time_limit, k.finished)
            };
            if finished {
                break;
            }
            let Some(t) = next else {
                break;
            };
            if limit.is_some_and(|limit| t > limit) {
                model.log("Simulation time limit reached");
                break;
            }
            model.fire_timers(t);
        }
        Ok(())
    }

    pub fn time_steps(&self) -> u64 {
        self.model.kernel.borrow().time
    }

    /// Current value of `top.<path>`, after or between runs.
    pub fn peek(&self, path: &str) -> SimResult<u32> {
        let k = self.model.kernel.borrow();
        let name = format!("{}.{}", k.nets[ROOT].name, path);
        let h = *k
            .by_name
            .get(&name)
            .ok_or(SimError::NoSuchObject(name))?;
        Ok(k.value_of(h))
    }

    pub fn transcript(&self) -> Vec<String> {
        self.model.kernel.borrow().transcript.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crate::TestOutcome;

    // y = !a, plus an 8-bit bus mirrored to `copy`
    #[derive(Default)]
    struct Inverter;

    impl Circuit for Inverter {
        fn ports(&self) -> Vec<Port> {
            vec![
                Port::input("a", 1),
                Port::output("y", 1),
                Port::input("bus", 8),
                Port::output("copy", 8),
            ]
        }
        fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
            let a = pins.get("a")?;
            pins.drive("y", !a & 1)?;
            let bus = pins.get("bus")?;
            pins.drive("copy", bus)
        }
    }

    // drives its own output from its output
    struct Oscillator;

    impl Circuit for Oscillator {
        fn ports(&self) -> Vec<Port> {
            vec![Port::output("y", 1)]
        }
        fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
            let y = pins.get("y")?;
            pins.drive("y", !y & 1)
        }
    }

    fn run(tests: RstbTests) -> RegressionReport {
        ModelSim::new("tb", Inverter)
            .unwrap()
            .quiet()
            .run(tests, TbConfig::new("model"))
            .unwrap()
    }

    fn expect(cond: bool, msg: &str) -> RstbResult {
        match cond {
            true => Ok(Val::None),
            false => Err(Val::from(msg)),
        }
    }

    async fn writes_are_deposited(dut: SimObject) -> RstbResult {
        let a = dut.c("a")?;
        a.set(1)?;
        expect(a.u32()? == 0, "write applied before the next delta")?;
        Trigger::read_only().await?;
        expect(a.u32()? == 1, "write never applied")?;
        expect(dut.c("y")?.u32()? == 0, "output did not settle")
    }

    async fn edge_sees_pre_edge_outputs(dut: SimObject) -> RstbResult {
        let a = dut.c("a")?;
        let y = dut.c("y")?;
        Task::fork(async move {
            Trigger::timer(10, "ns")?.await?;
            a.set(1)?;
            Ok::<_, Val>(Val::None)
        });
        a.rising_edge().await?;
        expect(y.u32()? == 1, "edge waiter saw the settled output")?;
        Trigger::read_only().await?;
        expect(y.u32()? == 0, "output did not settle after the edge")?;
        let ns = sim_if().get_sim_time("ns")?;
        expect(ns == 10.0, "edge at the wrong time")
    }

    async fn read_only_rejects_writes(dut: SimObject) -> RstbResult {
        Trigger::read_only().await?;
        dut.c("a")?.set(1)?;
        Ok(Val::None)
    }

    async fn bit_selects_merge(dut: SimObject) -> RstbResult {
        let bus = dut.c("bus")?;
        bus.idx(0)?.set(1)?;
        bus.idx(3)?.set(1)?;
        Trigger::read_only().await?;
        expect(dut.c("copy")?.u32()? == 0b1001, "bit writes clobbered each other")?;
        expect(dut.c("copy")?.bin()? == "00001001", "binary rendering")?;
        expect(SimObject::from_name("tb.copy[3]")?.u32()? == 1, "bit-select by name")
    }

    async fn waits_forever(dut: SimObject) -> RstbResult {
        Task::fork(Clock::new(dut.c("a")?, 10, "ns").start());
        loop {
            dut.c("a")?.rising_edge().await?;
        }
    }

    async fn looks_up_missing_object(dut: SimObject) -> RstbResult {
        dut.c("does_not_exist")?;
        Ok(Val::None)
    }

    async fn drives_an_output(dut: SimObject) -> RstbResult {
        dut.c("y")?.set(1)?;
        Ok(Val::None)
    }

    #[test]
    fn writes_land_in_the_next_delta() {
        let report = run(test_list![writes_are_deposited]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn edge_waiters_observe_outputs_from_before_the_edge() {
        let report = run(test_list![edge_sees_pre_edge_outputs]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn read_only_phase_rejects_writes() {
        let report = run(test_list![read_only_rejects_writes]);
        let outcome = &report.get("read_only_rejects_writes").unwrap().outcome;
        assert_eq!(
            outcome,
            &TestOutcome::Failed(SimError::ReadOnlyPhase.to_string())
        );
    }

    #[test]
    fn bit_select_writes_merge_within_a_delta() {
        let report = run(test_list![bit_selects_merge]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn time_limit_ends_a_hanging_test() {
        let sim = ModelSim::new("tb", Inverter)
            .unwrap()
            .quiet()
            .with_time_limit(100, "ns")
            .unwrap();
        let report = sim.run(test_list![waits_forever], TbConfig::new("model")).unwrap();
        assert_eq!(
            report.tests[0].outcome.message(),
            "Simulation ended before the test completed"
        );
        assert!(sim.time_steps() <= 100);
        assert!(sim
            .transcript()
            .iter()
            .any(|l| l.ends_with("Simulation time limit reached")));
    }

    #[test]
    fn unknown_objects_and_outputs_are_errors() {
        let report = run(test_list![looks_up_missing_object, drives_an_output]);
        assert_eq!(
            report.tests[0].outcome,
            TestOutcome::Failed("no simulator object named 'tb.does_not_exist'".to_string())
        );
        assert_eq!(
            report.tests[1].outcome,
            TestOutcome::Failed("object 'tb.y' can't be written from the testbench".to_string())
        );
    }

    #[test]
    fn combinational_loop_overflows_deltas() {
        let sim = ModelSim::new("tb", Oscillator).unwrap().quiet();
        let err = sim
            .run(test_list![writes_are_deposited], TbConfig::new("model"))
            .unwrap_err();
        assert!(matches!(err, SimError::DeltaOverflow(MAX_DELTAS)));
    }

    #[test]
    fn rejects_bad_ports() {
        struct Wide;
        impl Circuit for Wide {
            fn ports(&self) -> Vec<Port> {
                vec![Port::input("w", 33)]
            }
            fn eval(&mut self, _: &mut Pins<'_>) -> SimResult<()> {
                Ok(())
            }
        }
        assert!(matches!(ModelSim::new("tb", Wide), Err(SimError::Circuit(_))));
        assert!(matches!(ModelSim::new("t.b", Inverter), Err(SimError::Circuit(_))));
    }

    #[test]
    fn peek_reads_settled_values() {
        let sim = ModelSim::new("tb", Inverter).unwrap().quiet();
        sim.run(test_list![writes_are_deposited], TbConfig::new("model"))
            .unwrap();
        assert_eq!(sim.peek("a").unwrap(), 1);
        assert_eq!(sim.peek("y").unwrap(), 0);
        assert!(sim.peek("nope").is_err());
    }

    async fn binary_writes(dut: SimObject) -> RstbResult {
        let bus = dut.c("bus")?;
        let copy = dut.c("copy")?;
        bus.set_bin("0b0000_0001")?;
        Trigger::timer_ro(1, "ns").await?;
        expect(copy.bin()? == "00000001", "binary write not applied")?;
        Trigger::timer(1, "ns")?.await?;
        bus.set_bin("1xz0_ZzX1")?;
        let short = bus.set_bin("0101");
        let bad_char = bus.set_bin("0000000a");
        expect(
            matches!(short, Err(SimError::InvalidValue { reason: "length mismatch", .. })),
            "short string accepted",
        )?;
        expect(
            matches!(bad_char, Err(SimError::InvalidValue { reason: "invalid characters", .. })),
            "invalid character accepted",
        )?;
        Trigger::read_only().await?;
        expect(copy.u32()? == 0b1000_0001, "x and z should read as 0")
    }

    async fn timed_phases(dut: SimObject) -> RstbResult {
        let a = dut.c("a")?;
        Trigger::timer_rw(5, "ns").await?;
        expect(sim_if().get_sim_time("ns")? == 5.0, "read-write phase at the wrong time")?;
        a.set(1)?;
        Trigger::timer_ro(5, "ns").await?;
        expect(sim_if().get_sim_time("ns")? == 10.0, "read-only phase at the wrong time")?;
        expect(dut.c("y")?.u32()? == 0, "write from the read-write phase was lost")
    }

    async fn low_first_clock(dut: SimObject) -> RstbResult {
        let a = dut.c("a")?;
        Task::fork(Clock::new(a, 10, "ns").start_low().start());
        a.rising_edge_rw().await?;
        expect(sim_if().get_sim_time("ns")? == 5.0, "first rising edge should be half a period in")?;
        expect(dut.c("y")?.u32()? == 0, "output not settled in the read-write phase")?;
        a.falling_edge_ro().await?;
        expect(sim_if().get_sim_time("ns")? == 10.0, "falling edge at the wrong time")?;
        expect(dut.c("y")?.u32()? == 1, "output not settled after the falling edge")
    }

    #[test]
    fn binary_strings_write_and_validate() {
        let report = run(test_list![binary_writes]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn timers_can_resume_in_a_later_phase() {
        let report = run(test_list![timed_phases]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn low_first_clock_rises_after_half_a_period() {
        let report = run(test_list![low_first_clock]);
        assert!(report.all_passed(), "{:?}", report);
    }

    #[test]
    fn summary_table_is_logged() {
        let sim = ModelSim::new("tb", Inverter).unwrap().quiet();
        sim.run(test_list![writes_are_deposited, read_only_rejects_writes], TbConfig::new("model"))
            .unwrap();
        let transcript = sim.transcript();
        assert!(transcript
            .iter()
            .any(|l| l.contains("TESTS=2 PASS=1 FAIL=1 SKIP=0")));
        assert!(transcript
            .iter()
            .any(|l| l.contains("TEST writes_are_deposited: Result=passed")));
    }

    #[test]
    fn circuit_can_log_while_evaluating() {
        // logs every value it sees on `a`
        struct Chatty;
        impl Circuit for Chatty {
            fn ports(&self) -> Vec<Port> {
                vec![Port::input("a", 1)]
            }
            fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
                sim_if().log(&format!("circuit saw a={}", pins.get("a")?));
                Ok(())
            }
        }

        async fn raises_a(dut: SimObject) -> RstbResult {
            dut.c("a")?.set(1)?;
            Trigger::read_only().await?;
            Ok(Val::None)
        }

        let sim = ModelSim::new("tb", Chatty).unwrap().quiet();
        let report = sim.run(test_list![raises_a], TbConfig::new("model")).unwrap();
        assert!(report.all_passed(), "{:?}", report);
        assert!(sim.transcript().iter().any(|l| l.ends_with("circuit saw a=1")));
    }
}
