mod configuring;
mod fault_handling;
mod rig;
mod startup;
