include!(concat!(env!("OUT_DIR"), "/skywallet.rs"));
