//! Static installation walkthroughs shown to users who install a profile by hand.

/// Walkthrough for devices on the broadcast variant
pub const BROADCAST_INSTRUCTIONS: &str = "1. Save QR Code (if applicable)\n\
2. Go to Settings on your device\n\
3. Tap 'Network & internet' or 'Connections'\n\
4. Tap 'SIMs' or 'SIM Manager'\n\
5. Tap 'Add eSIM' or 'Download a SIM instead?'\n\
6. Follow on-screen instructions to scan a QR code or enter an activation code manually.\n   \
(Activation Code: Often starts with 'LPA:1$...')\n\
7. Confirm download and activation.";

/// Walkthrough for devices on the closure variant
pub const CLOSURE_INSTRUCTIONS: &str = "1. Save QR Code (if applicable)\n\
2. On your device, go to Settings\n\
3. Tap Cellular or Mobile Data\n\
4. Tap Add Cellular Plan or Add eSIM\n\
5. Follow prompts to use a QR code or enter details manually.\n   \
(Activation Code often starts with 'LPA:1$...')";
